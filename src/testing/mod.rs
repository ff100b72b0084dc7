//! Test support: a scripted transport for driving fetch controllers
//! without a network.
//!
//! Use [`MockTransport`] with [`create_fetch_with`](crate::fetch::create_fetch_with)
//! to script replies per path and to hold replies behind a [`Gate`] until the
//! test releases them.

pub mod mock;

pub use mock::{Gate, MockReply, MockTransport};
