//! Trip API: persistence of trips and stops.
//!
//! Every route answers with a `{data, message, error}` envelope. Routes:
//!
//! - `GET {base}/trip/{user_id}` lists a user's trips with their stops
//! - `POST {base}/trip/create` creates a trip
//! - `PUT {base}/trip/{trip_id}` / `DELETE {base}/trip/{trip_id}`
//! - `POST {base}/stop` / `PUT {base}/stop` / `DELETE {base}/stop`

mod client;
mod envelope;
mod error;

pub use client::{HttpTripApi, StopCreation, TripApi, TripApiConfig, select_active_trip};
pub use envelope::Envelope;
pub use error::ApiError;
