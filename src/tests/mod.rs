//! End-to-end tests of the decision service.
