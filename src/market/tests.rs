//! Tests for static market data

use super::*;
use rust_decimal_macros::dec;
use std::io::Write;

#[tokio::test]
async fn test_static_forecasts_partial_coverage() {
    let data = StaticMarketData::from_forecasts(vec![
        AssetForecast::new("AAA", dec!(10), 0.10, 0.2),
        AssetForecast::new("BBB", dec!(20), 0.02, 0.1),
    ]);

    let symbols = vec!["AAA".to_string(), "ZZZ".to_string()];
    let forecasts = data.forecasts(&symbols).await.unwrap();

    assert_eq!(forecasts.len(), 1);
    assert!(forecasts.contains_key("AAA"));
    assert!(!forecasts.contains_key("ZZZ"));
}

#[tokio::test]
async fn test_newer_forecast_supersedes() {
    let mut data = StaticMarketData::new();
    data.insert_forecast(AssetForecast::new("AAA", dec!(10), 0.10, 0.2));
    data.insert_forecast(AssetForecast::new("AAA", dec!(12), 0.07, 0.25));

    let forecasts = data.forecasts(&["AAA".to_string()]).await.unwrap();
    assert_eq!(forecasts["AAA"].expected_return, 0.07);
    assert_eq!(data.latest_price("AAA").await.unwrap(), Some(dec!(12)));
}

#[tokio::test]
async fn test_price_overrides_and_removal() {
    let mut data = StaticMarketData::from_forecasts(vec![AssetForecast::new("AAA", dec!(10), 0.1, 0.2)]);
    data.set_price("AAA", dec!(11.5));
    assert_eq!(data.latest_price("AAA").await.unwrap(), Some(dec!(11.5)));

    data.remove_price("AAA");
    assert_eq!(data.latest_price("AAA").await.unwrap(), None);
    assert_eq!(data.latest_price("NOPE").await.unwrap(), None);
}

#[tokio::test]
async fn test_load_snapshot_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "forecasts": [
                {{"symbol": "SCOM", "current_price": "17.20", "expected_return": 0.08, "annualized_volatility": 0.22}},
                {{"symbol": "EQTY", "current_price": "45.5", "expected_return": 0.03, "annualized_volatility": 0.18}}
            ],
            "prices": {{"SCOM": "17.35"}}
        }}"#
    )
    .unwrap();

    let data = StaticMarketData::from_json_file(file.path()).unwrap();
    let all = data.all_forecasts();

    assert_eq!(all.len(), 2);
    assert_eq!(all[0].symbol, "EQTY");
    assert_eq!(data.latest_price("SCOM").await.unwrap(), Some(dec!(17.35)));
    assert_eq!(data.latest_price("EQTY").await.unwrap(), Some(dec!(45.5)));
}
