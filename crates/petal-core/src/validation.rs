//! # Validation Module
//!
//! Field validation for everything the admin and storefront submit.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Frontend forms                                               │
//! │  └── Immediate feedback (empty fields, obvious typos)                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: HTTP handler (Rust)                                          │
//! │  ├── Type validation (deserialization)                                 │
//! │  └── THIS MODULE: field rules, pricing rule                            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (quantity >= 0)                                             │
//! │  └── UNIQUE (email), PRIMARY KEY (kind, value)                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `sell_price > cost_price` rule lives only here. The store accepts any
//! non-negative prices so that imports and repricing never fail on it.
//!
//! ## Usage
//! ```rust
//! use petal_core::validation::{validate_phone, validate_quantity};
//!
//! validate_quantity(12).unwrap();
//! validate_phone("0901 234 567").unwrap();
//! ```

use crate::error::ValidationError;
use crate::types::{AccessRequestInput, CustomerInput, EmployeeInput, ProductInput};
use crate::{MAX_AMOUNT, MAX_CART_LINES, MAX_ITEM_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a required free-text field and returns it trimmed.
pub fn validate_required(field: &str, value: &str, max: usize) -> ValidationResult<String> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::required(field));
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(value.to_string())
}

/// Validates a person's or product's display name.
///
/// ## Example
/// ```rust
/// use petal_core::validation::validate_name;
///
/// assert!(validate_name("customer name", "Chị Lan").is_ok());
/// assert!(validate_name("customer name", "  ").is_err());
/// ```
pub fn validate_name(field: &str, name: &str) -> ValidationResult<String> {
    validate_required(field, name, 200)
}

/// Validates a phone number.
///
/// ## Rules
/// - Digits, spaces, dashes, dots and a leading `+`
/// - 8 to 15 digits
pub fn validate_phone(phone: &str) -> ValidationResult<String> {
    let phone = validate_required("phone", phone, 32)?;

    let allowed = phone
        .char_indices()
        .all(|(i, c)| c.is_ascii_digit() || matches!(c, ' ' | '-' | '.') || (c == '+' && i == 0));
    let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();

    if !allowed || !(8..=15).contains(&digits) {
        return Err(ValidationError::InvalidFormat {
            field: "phone".to_string(),
            reason: "must contain 8 to 15 digits".to_string(),
        });
    }

    Ok(phone)
}

/// Validates an email address and returns it lowercased.
///
/// Only the shape is checked: one `@`, a non-empty local part and a dotted
/// domain.
pub fn validate_email(email: &str) -> ValidationResult<String> {
    let email = validate_required("email", email, 254)?.to_lowercase();

    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };

    if !valid {
        return Err(ValidationError::InvalidFormat {
            field: "email".to_string(),
            reason: "must look like name@example.com".to_string(),
        });
    }

    Ok(email)
}

/// Validates a search query.
///
/// ## Rules
/// - Can be empty (returns everything)
/// - Maximum 100 characters
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.chars().count() > 100 {
        return Err(ValidationError::TooLong {
            field: "query".to_string(),
            max: 100,
        });
    }

    Ok(query.to_string())
}

/// Validates a password for a new identity.
pub fn validate_password(password: &str) -> ValidationResult<()> {
    if password.is_empty() {
        return Err(ValidationError::required("password"));
    }

    if password.chars().count() < 6 {
        return Err(ValidationError::InvalidFormat {
            field: "password".to_string(),
            reason: "must be at least 6 characters".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a stock level entered on the product form. Zero is allowed.
pub fn validate_stock_level(qty: i64) -> ValidationResult<()> {
    if qty < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "quantity".to_string(),
        });
    }

    Ok(())
}

/// Validates a money amount in dong: `0..=MAX_AMOUNT`.
///
/// ## Example
/// ```rust
/// use petal_core::validation::validate_amount;
/// use petal_core::MAX_AMOUNT;
///
/// assert!(validate_amount("amount paid", 0).is_ok());
/// assert!(validate_amount("amount paid", -1).is_err());
/// assert!(validate_amount("amount paid", MAX_AMOUNT + 1).is_err());
/// ```
pub fn validate_amount(field: &str, amount: i64) -> ValidationResult<()> {
    if amount < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }

    if amount > MAX_AMOUNT {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_AMOUNT,
        });
    }

    Ok(())
}

/// Validates the pricing pair on the product form.
///
/// ## Rules
/// - Both prices non-negative
/// - Sell price strictly above cost price
pub fn validate_pricing(sell_price: i64, cost_price: i64) -> ValidationResult<()> {
    validate_amount("sell price", sell_price)?;
    validate_amount("cost price", cost_price)?;

    if sell_price <= cost_price {
        return Err(ValidationError::InvalidFormat {
            field: "sell price".to_string(),
            reason: "must be greater than cost price".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates the number of lines in a cart or receipt: `1..=MAX_CART_LINES`.
pub fn validate_cart_size(lines: usize) -> ValidationResult<()> {
    if lines == 0 || lines > MAX_CART_LINES {
        return Err(ValidationError::OutOfRange {
            field: "cart lines".to_string(),
            min: 1,
            max: MAX_CART_LINES as i64,
        });
    }

    Ok(())
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string format.
///
/// ## Example
/// ```rust
/// use petal_core::validation::validate_uuid;
///
/// assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("not-a-uuid").is_err());
/// ```
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::required("id"));
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Form Validators
// =============================================================================

/// Validates the product form and returns a normalized copy.
///
/// Color, quality, size and unit are free text here; the managed option
/// vocabularies feed the form's pickers but are not enforced on save.
pub fn validate_product_input(input: &ProductInput) -> ValidationResult<ProductInput> {
    let name = validate_name("name", &input.name)?;
    validate_stock_level(input.quantity)?;
    validate_pricing(input.sell_price, input.cost_price)?;
    if let Some(max) = input.max_discount_per_unit {
        validate_amount("max discount", max)?;
        if max > input.sell_price {
            return Err(ValidationError::OutOfRange {
                field: "max discount".to_string(),
                min: 0,
                max: input.sell_price,
            });
        }
    }

    Ok(ProductInput {
        name,
        color: input.color.trim().to_string(),
        quality: input.quality.trim().to_string(),
        size: input.size.trim().to_string(),
        unit: input.unit.trim().to_string(),
        ..input.clone()
    })
}

pub fn validate_customer_input(input: &CustomerInput) -> ValidationResult<CustomerInput> {
    Ok(CustomerInput {
        name: validate_name("name", &input.name)?,
        phone: validate_phone(&input.phone)?,
        email: input.email.as_deref().map(validate_email).transpose()?,
        ..input.clone()
    })
}

pub fn validate_employee_input(input: &EmployeeInput) -> ValidationResult<EmployeeInput> {
    Ok(EmployeeInput {
        name: validate_name("name", &input.name)?,
        email: validate_email(&input.email)?,
        phone: validate_phone(&input.phone)?,
        position: validate_required("position", &input.position, 100)?,
        ..input.clone()
    })
}

pub fn validate_access_request(input: &AccessRequestInput) -> ValidationResult<AccessRequestInput> {
    Ok(AccessRequestInput {
        name: validate_name("name", &input.name)?,
        email: validate_email(&input.email)?,
        phone: validate_phone(&input.phone)?,
        ..input.clone()
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("name", "  Hoa Hồng ").unwrap(), "Hoa Hồng");
        assert!(validate_name("name", "").is_err());
        assert!(validate_name("name", &"A".repeat(201)).is_err());
    }

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone("0901234567").is_ok());
        assert!(validate_phone("+84 90 123 4567").is_ok());
        assert!(validate_phone("12-34").is_err());
        assert!(validate_phone("09012a4567").is_err());
        assert!(validate_phone("").is_err());
    }

    #[test]
    fn test_validate_email() {
        assert_eq!(validate_email("Lan@Shop.VN").unwrap(), "lan@shop.vn");
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("a@b").is_err());
        assert!(validate_email("@shop.vn").is_err());
        assert!(validate_email("a b@shop.vn").is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(MAX_ITEM_QUANTITY).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(MAX_ITEM_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_validate_amount_bounds() {
        assert!(validate_amount("unit price", MAX_AMOUNT).is_ok());
        assert!(matches!(
            validate_amount("unit price", i64::MAX / 2),
            Err(ValidationError::OutOfRange { max: MAX_AMOUNT, .. })
        ));
        assert!(validate_pricing(i64::MAX, 1).is_err());
    }

    #[test]
    fn test_validate_cart_size() {
        assert!(validate_cart_size(1).is_ok());
        assert!(validate_cart_size(MAX_CART_LINES).is_ok());
        assert!(validate_cart_size(0).is_err());
        assert!(validate_cart_size(MAX_CART_LINES + 1).is_err());
    }

    #[test]
    fn test_validate_pricing() {
        assert!(validate_pricing(12_000, 8_000).is_ok());
        assert!(validate_pricing(8_000, 8_000).is_err());
        assert!(validate_pricing(5_000, 8_000).is_err());
        assert!(validate_pricing(-1, -5).is_err());
    }

    #[test]
    fn test_validate_product_input() {
        let input = ProductInput {
            name: " Rose ".into(),
            color: " red".into(),
            quality: "A".into(),
            size: "60cm".into(),
            unit: "stem".into(),
            quantity: 10,
            sell_price: 10_000,
            cost_price: 6_000,
            max_discount_per_unit: Some(1_000),
            image_url: None,
        };
        let clean = validate_product_input(&input).unwrap();
        assert_eq!(clean.name, "Rose");
        assert_eq!(clean.color, "red");

        let too_generous = ProductInput {
            max_discount_per_unit: Some(20_000),
            ..input.clone()
        };
        assert!(validate_product_input(&too_generous).is_err());

        let off_vocabulary = ProductInput {
            color: "ombre peach".into(),
            unit: "bó".into(),
            ..input.clone()
        };
        assert_eq!(validate_product_input(&off_vocabulary).unwrap().color, "ombre peach");

        let negative_stock = ProductInput {
            quantity: -1,
            ..input
        };
        assert!(validate_product_input(&negative_stock).is_err());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("").is_err());
        assert!(validate_uuid("123").is_err());
    }
}
