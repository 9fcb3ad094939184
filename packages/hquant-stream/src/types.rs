use serde::{Deserialize, Serialize};

/// Milliseconds since epoch.
pub type Timestamp = i64;

/// Anything that lives on a timeline.
pub trait Series {
    fn timestamp(&self) -> Timestamp;
}

/// A series item that can feed another indicator as a plain scalar.
///
/// "Not yet computable" values surface as `f64::NAN`.
pub trait Reusable: Series {
    fn value(&self) -> f64;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub timestamp: Timestamp,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
}

impl Quote {
    pub fn new(timestamp: Timestamp, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Flat bar: open = high = low = close.
    pub fn flat(timestamp: Timestamp, price: f64) -> Self {
        Self::new(timestamp, price, price, price, price, 0.0)
    }

    #[inline]
    pub fn field(&self, field: Field) -> f64 {
        match field {
            Field::Open => self.open,
            Field::High => self.high,
            Field::Low => self.low,
            Field::Close => self.close,
            Field::Volume => self.volume,
            Field::Hl2 => (self.high + self.low) / 2.0,
            Field::Hlc3 => (self.high + self.low + self.close) / 3.0,
            Field::Oc2 => (self.open + self.close) / 2.0,
            Field::Ohlc4 => (self.open + self.high + self.low + self.close) / 4.0,
        }
    }
}

impl Series for Quote {
    #[inline]
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

impl Reusable for Quote {
    #[inline]
    fn value(&self) -> f64 {
        self.close
    }
}

/// Parses a JSON array of quotes.
pub fn quotes_from_json(json: &str) -> Result<Vec<Quote>, serde_json::Error> {
    serde_json::from_str(json)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Open,
    High,
    Low,
    #[default]
    Close,
    Volume,
    Hl2,
    Hlc3,
    Oc2,
    Ohlc4,
}

/// Scalar output of an indicator. `None` marks the warmup period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeValue {
    pub timestamp: Timestamp,
    pub value: Option<f64>,
}

impl TimeValue {
    pub fn new(timestamp: Timestamp, value: Option<f64>) -> Self {
        Self { timestamp, value }
    }

    /// Non-finite values collapse to `None`.
    pub fn from_f64(timestamp: Timestamp, value: f64) -> Self {
        Self {
            timestamp,
            value: value.is_finite().then_some(value),
        }
    }

    pub fn empty(timestamp: Timestamp) -> Self {
        Self {
            timestamp,
            value: None,
        }
    }
}

impl Series for TimeValue {
    #[inline]
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

impl Reusable for TimeValue {
    #[inline]
    fn value(&self) -> f64 {
        self.value.unwrap_or(f64::NAN)
    }
}
