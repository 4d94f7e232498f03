use serde_json::json;

use digit_scope::deriv::types::{
    msg_type, parse_active_symbols, parse_tick, pip_to_decimals, ActiveSymbolsRequest,
    ForgetAllRequest, TicksRequest,
};
use digit_scope::error::AppError;

#[test]
fn request_frames_match_wire_format() {
    assert_eq!(
        serde_json::to_string(&TicksRequest::subscribe("R_100")).unwrap(),
        r#"{"ticks":"R_100","subscribe":1}"#
    );
    assert_eq!(
        serde_json::to_string(&ForgetAllRequest::default()).unwrap(),
        r#"{"forget_all":"ticks"}"#
    );
    assert_eq!(
        serde_json::to_string(&ActiveSymbolsRequest::default()).unwrap(),
        r#"{"active_symbols":"brief","product_type":"basic"}"#
    );
}

#[test]
fn parse_tick_frame() {
    let frame = json!({
        "echo_req": {"ticks": "R_100", "subscribe": 1},
        "msg_type": "tick",
        "subscription": {"id": "b1c2"},
        "tick": {
            "ask": 1234.57,
            "bid": 1234.55,
            "epoch": 1_700_000_000u64,
            "id": "b1c2",
            "pip_size": 2,
            "quote": 1234.56,
            "symbol": "R_100"
        }
    });
    assert_eq!(msg_type(&frame), Some("tick"));

    let tick = parse_tick(&frame).unwrap();
    assert_eq!(tick.symbol, "R_100");
    assert_eq!(tick.epoch, 1_700_000_000);
    assert_eq!(tick.pip_size, Some(2));
    assert!((tick.quote - 1234.56).abs() < f64::EPSILON);
}

#[test]
fn parse_tick_accepts_string_quote_and_missing_pip_size() {
    let frame = json!({
        "msg_type": "tick",
        "tick": {"epoch": 1, "quote": "98.7", "symbol": "R_50"}
    });
    let tick = parse_tick(&frame).unwrap();
    assert_eq!(tick.pip_size, None);
    assert!((tick.quote - 98.7).abs() < f64::EPSILON);
}

#[test]
fn parse_tick_surfaces_api_error() {
    let frame = json!({
        "msg_type": "tick",
        "error": {"code": "MarketIsClosed", "message": "This market is presently closed."}
    });
    match parse_tick(&frame) {
        Err(AppError::DerivApi { code, message }) => {
            assert_eq!(code, "MarketIsClosed");
            assert_eq!(message, "This market is presently closed.");
        }
        other => panic!("expected API error, got {:?}", other),
    }

    let frame = json!({"msg_type": "tick"});
    assert!(matches!(parse_tick(&frame), Err(AppError::Protocol(_))));

    let frame = json!({"msg_type": "tick", "tick": {"epoch": 1, "symbol": "R_50"}});
    assert!(matches!(parse_tick(&frame), Err(AppError::Json(_))));
}

#[test]
fn parse_active_symbols_frame() {
    let frame = json!({
        "msg_type": "active_symbols",
        "active_symbols": [
            {
                "display_name": "Volatility 100 Index",
                "market": "synthetic_index",
                "market_display_name": "Derived",
                "pip": 0.01,
                "submarket": "random_index",
                "submarket_display_name": "Continuous Indices",
                "symbol": "R_100"
            },
            {
                "display_name": "Volatility 10 (1s) Index",
                "pip": 0.001,
                "symbol": "1HZ10V"
            }
        ]
    });
    assert_eq!(msg_type(&frame), Some("active_symbols"));

    let symbols = parse_active_symbols(&frame).unwrap();
    assert_eq!(symbols.len(), 2);
    assert_eq!(symbols[0].symbol, "R_100");
    assert_eq!(symbols[0].market, "synthetic_index");
    assert_eq!(symbols[0].pip_size(), Some(2));
    assert_eq!(symbols[1].market, "");
    assert_eq!(symbols[1].pip_size(), Some(3));
}

#[test]
fn pip_decimals() {
    assert_eq!(pip_to_decimals(1.0), Some(0));
    assert_eq!(pip_to_decimals(0.1), Some(1));
    assert_eq!(pip_to_decimals(0.0001), Some(4));
    assert_eq!(pip_to_decimals(0.0), None);
    assert_eq!(pip_to_decimals(-0.01), None);
    assert_eq!(pip_to_decimals(f64::NAN), None);
}

#[test]
fn frames_without_msg_type() {
    assert_eq!(msg_type(&json!({"ping": "pong"})), None);
    assert_eq!(msg_type(&json!({"msg_type": 5})), None);
}
