pub mod clock;
pub mod payment;
pub mod repository;

pub use clock::{Clock, ManualClock, SystemClock};
pub use payment::{MockPaymentAdapter, PaymentAdapter, PaymentIntent, PaymentStatus};
pub use repository::{StoreError, Versioned};
