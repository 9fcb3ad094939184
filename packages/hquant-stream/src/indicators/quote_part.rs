use crate::error::HubError;
use crate::transform::{Recovery, Transform};
use crate::{Field, Quote, TimeValue};

/// Projects a quote onto one scalar so it can feed value-based indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QuotePart {
    field: Field,
}

impl QuotePart {
    pub fn new(field: Field) -> Self {
        Self { field }
    }

    pub fn field(&self) -> Field {
        self.field
    }
}

impl Transform<Quote> for QuotePart {
    type Output = TimeValue;
    type State = ();

    fn name(&self) -> String {
        format!("QUOTE-PART({:?})", self.field).to_uppercase()
    }

    fn validate(&self) -> Result<(), HubError> {
        Ok(())
    }

    fn warmup_length(&self) -> usize {
        0
    }

    fn recovery(&self) -> Recovery {
        Recovery::Replay { lookback: 0 }
    }

    fn init_state(&self) {}

    fn compute(&self, provider: &[Quote], index: usize, _state: &mut ()) -> TimeValue {
        let q = &provider[index];
        TimeValue::from_f64(q.timestamp, q.field(self.field))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selects_field() {
        let quotes = [Quote::new(1, 1.0, 3.0, 0.5, 2.0, 9.0)];
        let hl2 = QuotePart::new(Field::Hl2);
        assert_eq!(hl2.name(), "QUOTE-PART(HL2)");
        assert_eq!(hl2.batch(&quotes)[0].value, Some(1.75));
        assert_eq!(QuotePart::default().batch(&quotes)[0].value, Some(2.0));
    }
}
