pub mod fuzz;
pub mod model;
pub mod token;

pub use model::ModelLedger;
pub use token::Token;
