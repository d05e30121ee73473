pub mod availability;
pub mod booking;
pub mod maintenance;
pub mod pricing;
pub mod scheduler;

pub use availability::{AvailabilityIndex, SeatMap, SeatMapEntry, SeatState};
pub use booking::BookingEngine;
pub use maintenance::{MaintenanceService, SweepStats};
pub use pricing::PricingResolver;
pub use scheduler::SessionScheduler;
