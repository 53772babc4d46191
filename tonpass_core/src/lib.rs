pub mod coefficient;
pub mod command;
pub mod flow;
pub mod ledger;
pub mod payment;
pub mod session;

pub use crate::coefficient::{coefficient_label, draw_coefficient, CoefficientRenderer};
pub use crate::command::{route, Action, Incoming};
pub use crate::flow::{Controller, FlowConfig, Reply};
pub use crate::ledger::{MemoryStore, PaidUserStore, PaidUsers, PaidUsersLedger};
pub use crate::payment::{comment_token, find_payment, PaymentCheck, PaymentMatch, PaymentOracle};
pub use crate::session::{Sessions, UserSession, MAX_COEFFICIENTS};
