//! The HTTPS front door clients connect to: always intercepts `CONNECT`
//! tunnels and forwards decrypted requests through a [`SessionManager`].

mod ca;
mod server;

pub use ca::{Ca, CaError, RcgenCa};
pub use server::{MitmError, MitmServer};
