//! Full interactive sessions through the lifecycle manager.
