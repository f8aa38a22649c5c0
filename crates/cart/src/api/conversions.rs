//! Backend response conversion functions.
//!
//! Cart responses are wrapped in `{ success, message?, data: { cart: { items } } }`.
//! Lines arrive in one of two shapes depending on whether the backend
//! populated the product reference:
//!
//! ```json
//! { "product": { "_id": "p1", "name": "Chikki", "price": 40 }, "quantity": 2 }
//! { "productId": "p1", "name": "Chikki", "price": 40, "quantity": 2 }
//! ```

use pantry_core::types::price::price_from_value;
use pantry_core::{CartItem, ItemId};
use serde_json::{Map, Value};
use tracing::warn;

use super::CartApiError;

type Object = Map<String, Value>;

/// Check the envelope's `success` flag and return the body.
fn open_envelope(body: &str) -> Result<Object, CartApiError> {
    let value: Value = serde_json::from_str(body)?;
    let Value::Object(envelope) = value else {
        return Err(CartApiError::Malformed("response is not an object".to_string()));
    };

    match envelope.get("success") {
        Some(Value::Bool(true)) => Ok(envelope),
        Some(Value::Bool(false)) => {
            let message = envelope
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("request was not successful");
            Err(CartApiError::Rejected(message.to_string()))
        }
        _ => Err(CartApiError::Malformed(
            "missing boolean `success` field".to_string(),
        )),
    }
}

/// Parse an acknowledgement-only response (`{ success: true }`).
///
/// # Errors
///
/// Returns `Rejected` for `success: false` and `Malformed`/`Parse` for
/// anything that is not an envelope.
pub fn parse_ack(body: &str) -> Result<(), CartApiError> {
    open_envelope(body).map(|_| ())
}

/// Parse a cart response into line items.
///
/// Lines with a quantity below one are dropped; lines repeating an id are
/// folded into the first occurrence by summing quantities.
///
/// # Errors
///
/// Returns `Rejected` for `success: false` and `Malformed` when the cart or
/// any line lacks the required fields.
pub fn parse_cart_items(body: &str) -> Result<Vec<CartItem>, CartApiError> {
    let envelope = open_envelope(body)?;

    let lines = envelope
        .get("data")
        .and_then(|data| data.get("cart"))
        .and_then(|cart| cart.get("items"))
        .and_then(Value::as_array)
        .ok_or_else(|| CartApiError::Malformed("missing data.cart.items".to_string()))?;

    let mut items: Vec<CartItem> = Vec::with_capacity(lines.len());
    for (index, line) in lines.iter().enumerate() {
        let Some(item) = convert_line(line).map_err(|reason| {
            CartApiError::Malformed(format!("cart line {index}: {reason}"))
        })?
        else {
            continue;
        };

        if let Some(existing) = items.iter_mut().find(|i| i.id == item.id) {
            warn!(id = %item.id, "Backend returned duplicate cart line, merging");
            existing.quantity = existing.quantity.saturating_add(item.quantity);
        } else {
            items.push(item);
        }
    }

    Ok(items)
}

// =============================================================================
// Line Conversion
// =============================================================================

fn convert_line(line: &Value) -> Result<Option<CartItem>, String> {
    let Value::Object(line) = line else {
        return Err("line is not an object".to_string());
    };

    let quantity = line
        .get("quantity")
        .and_then(Value::as_i64)
        .ok_or("missing integer quantity")?;
    if quantity < 1 {
        return Ok(None);
    }
    let quantity = u32::try_from(quantity).map_err(|_| "quantity out of range")?;

    // A populated product takes precedence; the line's own `_id` is then the
    // line id, not the product id.
    let (id, source) = match line.get("product") {
        Some(Value::Object(product)) => {
            let id = first_id(product, &["_id", "id"]).ok_or("product has no id")?;
            (id, product)
        }
        Some(reference @ (Value::String(_) | Value::Number(_))) => {
            (id_from(reference).ok_or("invalid product reference")?, line)
        }
        _ => (
            first_id(line, &["productId", "id", "_id"]).ok_or("line has no product id")?,
            line,
        ),
    };

    let name = text(source, "name")
        .or_else(|| text(line, "name"))
        .ok_or("missing product name")?;
    let price = source
        .get("price")
        .or_else(|| line.get("price"))
        .map_or(rust_decimal::Decimal::ZERO, price_from_value);

    Ok(Some(CartItem {
        id,
        name,
        price,
        image: image(source).or_else(|| image(line)),
        category: category(source).or_else(|| category(line)),
        quantity,
    }))
}

fn id_from(value: &Value) -> Option<ItemId> {
    serde_json::from_value(value.clone()).ok()
}

fn first_id(obj: &Object, keys: &[&str]) -> Option<ItemId> {
    keys.iter().find_map(|key| obj.get(*key).and_then(id_from))
}

fn text(obj: &Object, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

fn image(obj: &Object) -> Option<String> {
    text(obj, "image").or_else(|| {
        obj.get("images")
            .and_then(Value::as_array)
            .and_then(|images| images.iter().find_map(Value::as_str))
            .map(str::to_owned)
    })
}

fn category(obj: &Object) -> Option<String> {
    match obj.get("category") {
        Some(Value::Object(category)) => text(category, "name"),
        Some(_) => text(obj, "category"),
        None => None,
    }
}
