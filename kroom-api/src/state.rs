use std::sync::Arc;

use kroom_booking::BookingEngine;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<BookingEngine>,
}
