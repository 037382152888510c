pub mod controller;
pub mod memory;
pub mod model;
pub mod repository;
pub mod service;
pub mod validator;

pub use model::{Account, AccountField, AccountPatch, Balance, NewAccount, Transaction, TransactionType};
pub use repository::AccountStore;
pub use service::AccountService;
