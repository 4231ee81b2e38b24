//! Test utilities.
//!
//! - [`MockProcessor`]: scriptable processor with call recording, failure
//!   injection and response delays
//! - [`fixtures`]: deterministic credentials, invoices and notification bodies
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bitgate_lib::test_utils::{fixtures, MockProcessor};
//!
//! let processor = MockProcessor::new();
//! processor.put_invoice(fixtures::invoice("inv1", "1001", InvoiceStatus::Paid));
//! let body = fixtures::notification("inv1", Network::Testnet);
//! ```

pub mod fixtures;
mod mock_processor;

pub use mock_processor::MockProcessor;
