pub mod mock;
pub mod openclaw;
