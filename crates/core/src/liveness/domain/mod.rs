pub mod blink_liveness;
