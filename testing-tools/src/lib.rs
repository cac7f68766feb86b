// Testing Tools Library
//
// Manual integration checks for the notification core against a live push
// endpoint. Currently includes:
// - sse-test-client: connects with a bearer token and runs one scenario

pub mod output;
pub mod scenarios;
pub mod sse_client;
