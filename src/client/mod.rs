//! Remote service clients

pub mod forecast;

pub use forecast::HttpForecastClient;
