pub mod inspect;
pub mod tx;
