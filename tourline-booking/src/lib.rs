pub mod models;
pub mod error;
pub mod rules;
pub mod repository;
pub mod memory;
pub mod orchestrator;
pub mod workflow;
pub mod sweep;

pub use models::{Booking, BookingStatus, Cancellation, CancelledBy, Customer};
pub use error::BookingError;
pub use rules::BookingRules;
pub use repository::{BookingRepository, InstanceRepository, TourCatalog};
pub use memory::MemoryStore;
pub use orchestrator::PaymentOrchestrator;
pub use workflow::{BookingReceipt, BookingWorkflow};
pub use sweep::SweepReport;
