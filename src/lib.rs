//! Mirrors one student's Campus Dual timetable into a dedicated Google
//! calendar.
//!
//! The core is a small synchronization routine ([`sync::SyncEngine`]): fetch
//! the portal's schedule, detect whether it changed since the last run, and
//! if so fully replace the destination calendar's event set. Scheduling is
//! external; a cron job or systemd timer invokes one cycle per run and
//! applies its own backoff when the exit code signals retry.

pub mod calendar;
pub mod config;
pub mod portal;
pub mod store;
pub mod sync;
