pub mod engine;
pub mod inventory;
pub mod coordinator;
pub mod settlement;
pub mod orchestrator;
pub mod cancellation;
pub mod reaper;
pub mod access;
pub mod catalog;

pub use engine::{EngineSettings, ReservationEngine};
pub use inventory::SeatMapEntry;
pub use orchestrator::{MockMode, MockPaymentAdapter, PaymentOrchestrator};
pub use settlement::PaymentOutcome;
