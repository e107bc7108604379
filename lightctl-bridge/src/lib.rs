//! Bridge between a serial multi-channel light controller and smart-home
//! accessories.
//!
//! ```text
//! serial ──lines──▶ driver ──replace──▶ state table ◀──get── accessory
//!   ▲                  │                    ▲                  │
//!   │                  └──push──▶ accessory │                  │ set
//!   └──────── ON n / OFF n ◀── dispatcher ──┘ optimistic ◀─────┘
//! ```

pub mod accessory;
pub mod config;
pub mod dispatch;
pub mod driver;
pub mod logging;
pub mod state;
pub mod transport;
pub mod web;
