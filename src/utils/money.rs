//! Money is kept as `BigDecimal` internally but leaves the service as a JSON number.

use bigdecimal::{BigDecimal, ToPrimitive};
use serde::Serializer;

pub fn serialize<S>(value: &BigDecimal, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value.to_f64() {
        Some(number) => serializer.serialize_f64(number),
        None => Err(serde::ser::Error::custom(format!(
            "amount {} is not representable as a JSON number",
            value
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use std::str::FromStr;

    #[derive(Serialize)]
    struct Priced {
        #[serde(serialize_with = "serialize")]
        price: BigDecimal,
    }

    #[test]
    fn serializes_as_number() {
        let priced = Priced {
            price: BigDecimal::from_str("499.50").unwrap(),
        };
        let value = serde_json::to_value(&priced).unwrap();

        assert!(value["price"].is_number());
        assert_eq!(value["price"].as_f64(), Some(499.5));
    }
}
