mod checks;
mod filters;
mod reservation;
mod table;
mod template;

pub use checks::{check_arrival, check_departure};
pub use filters::{filter_effects, filter_items, Filtered};
pub use reservation::{ArrivalPlan, Reservation, ReservationSide, ReservationState};
pub use table::ReservationTable;
pub use template::{format_message, MessageTokens};
