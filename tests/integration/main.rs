//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises the meter pipeline
//! against mock adapters.  All tests run on the host (x86_64) with no
//! real hardware required.

mod meter_service_tests;
mod mock_hw;
