//! # Checkout Module
//!
//! Prices a cart against a snapshot of the products it references.
//!
//! ## Pricing Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        price_cart                                       │
//! │                                                                         │
//! │  CartLine[] ──► merge duplicates ──► per line:                         │
//! │                                       ├── 1 ≤ qty ≤ MAX_ITEM_QUANTITY  │
//! │                                       ├── product exists               │
//! │                                       ├── qty ≤ stock                  │
//! │                                       └── discount ≤ cap × qty         │
//! │                                              │                          │
//! │                                              ▼                          │
//! │  subtotal       = Σ unit_price × qty                                   │
//! │  items_discount = Σ line discount                                      │
//! │  total          = subtotal − items_discount − overall_discount         │
//! │  debt           = max(0, total − paid)   (partial-payment methods)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything here runs before a single row is written. The database layer
//! calls [`price_cart`] inside its transaction, on products read in that same
//! transaction, and only then applies the guarded stock decrements.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{CartLine, CheckoutRequest, OrderLine, PaymentMethod, Product};
use crate::validation::{validate_amount, validate_name};
use crate::{MAX_CART_LINES, MAX_ITEM_QUANTITY};

/// One validated, priced line with its product snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PricedLine {
    pub product_id: String,
    pub name: String,
    pub color: String,
    pub size: String,
    pub unit: String,
    pub unit_price: Money,
    pub quantity: i64,
    pub discount: Money,
    pub note: Option<String>,
    pub line_total: Money,
}

/// Result of pricing an in-person sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PricedCart {
    pub lines: Vec<PricedLine>,
    pub subtotal: Money,
    pub items_discount: Money,
    pub overall_discount: Money,
    pub total: Money,
    pub amount_paid: Money,
    pub debt: Money,
}

/// Result of pricing a self-service order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PricedOrder {
    pub lines: Vec<PricedLine>,
    pub subtotal: Money,
    pub shipping_fee: Money,
    pub discount_code: Option<String>,
    pub discount_amount: Money,
    pub total: Money,
}

/// Amount paid now and the remainder carried as debt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    pub amount_paid: Money,
    pub debt: Money,
}

/// Merges lines that reference the same product.
///
/// Quantities and discounts add up, clamped at `i64::MAX` so an oversized
/// merge fails the later range checks; the first line's price and note win.
/// Order of first appearance is kept so invoices read like the cart did.
pub fn merge_lines(lines: &[CartLine]) -> Vec<CartLine> {
    let mut merged: Vec<CartLine> = Vec::with_capacity(lines.len());
    let mut index: HashMap<&str, usize> = HashMap::new();

    for line in lines {
        match index.get(line.product_id.as_str()) {
            Some(&i) => {
                let existing = &mut merged[i];
                existing.quantity = existing.quantity.saturating_add(line.quantity);
                existing.discount = existing.discount.saturating_add(line.discount);
                if existing.note.is_none() {
                    existing.note = line.note.clone();
                }
            }
            None => {
                index.insert(line.product_id.as_str(), merged.len());
                merged.push(line.clone());
            }
        }
    }

    merged
}

/// Prices a checkout cart.
///
/// ## Checks, in order
/// 1. cart non-empty and at most `MAX_CART_LINES` distinct products
/// 2. every quantity in `1..=MAX_ITEM_QUANTITY`
/// 3. product exists in `products`
/// 4. quantity ≤ stock on hand
/// 5. line discount within the product's cap
/// 6. overall discount ≤ subtotal − line discounts
/// 7. payment settles (see [`settle_payment`])
///
/// ## Example
/// ```rust
/// use std::collections::HashMap;
/// use chrono::Utc;
/// use petal_core::checkout::price_cart;
/// use petal_core::{CartLine, PaymentMethod, Product};
///
/// let rose = Product {
///     id: "rose".into(), name: "Rose".into(), color: "red".into(),
///     quality: "A".into(), size: "60cm".into(), unit: "stem".into(),
///     quantity: 5, sell_price: 10_000, cost_price: 6_000,
///     max_discount_per_unit: None, image_url: None, version: 1,
///     created_at: Utc::now(), updated_at: Utc::now(),
/// };
/// let products = HashMap::from([(rose.id.clone(), rose)]);
///
/// let priced = price_cart(&[CartLine::new("rose", 3)], &products, 0, PaymentMethod::Cash, 30_000)
///     .unwrap();
/// assert_eq!(priced.total.amount(), 30_000);
/// assert!(priced.debt.is_zero());
/// ```
pub fn price_cart(
    lines: &[CartLine],
    products: &HashMap<String, Product>,
    overall_discount: i64,
    payment_method: PaymentMethod,
    amount_paid: i64,
) -> CoreResult<PricedCart> {
    let lines = merge_lines(lines);
    check_cart_shape(lines.len())?;

    let mut priced = Vec::with_capacity(lines.len());
    for line in &lines {
        priced.push(price_line(line, products)?);
    }

    let subtotal = checked_total(
        "subtotal",
        priced.iter().map(|l| l.line_total.checked_add(l.discount)),
    )?;
    let items_discount = checked_total("items discount", priced.iter().map(|l| Some(l.discount)))?;

    validate_amount("overall discount", overall_discount)?;
    let overall_discount = Money::from_amount(overall_discount);
    let discountable = subtotal - items_discount;
    if overall_discount > discountable {
        return Err(ValidationError::OutOfRange {
            field: "overall discount".to_string(),
            min: 0,
            max: discountable.amount(),
        }
        .into());
    }

    let total = discountable - overall_discount;
    let settlement = settle_payment(total, payment_method, amount_paid)?;

    Ok(PricedCart {
        lines: priced,
        subtotal,
        items_discount,
        overall_discount,
        total,
        amount_paid: settlement.amount_paid,
        debt: settlement.debt,
    })
}

/// Splits a payment into the amount received and the debt left over.
///
/// Methods that settle in full reject an amount short of the total.
pub fn settle_payment(
    total: Money,
    method: PaymentMethod,
    amount_paid: i64,
) -> CoreResult<Settlement> {
    validate_amount("amount paid", amount_paid)?;
    let paid = Money::from_amount(amount_paid);

    if paid < total && !method.permits_partial_payment() {
        return Err(CoreError::PartialPaymentNotAllowed {
            method: method.as_str().to_string(),
            paid: amount_paid,
            total: total.amount(),
        });
    }

    Ok(Settlement {
        amount_paid: paid,
        debt: total.saturating_sub_floor_zero(paid),
    })
}

/// Looks up a discount code and returns the amount it takes off `subtotal`.
///
/// Codes are matched case-insensitively against the configured table. A
/// blank code means no discount. The discount never exceeds the subtotal.
pub fn resolve_discount(
    code: Option<&str>,
    codes: &HashMap<String, i64>,
    subtotal: Money,
) -> CoreResult<(Option<String>, Money)> {
    let code = match code.map(str::trim).filter(|c| !c.is_empty()) {
        Some(code) => code.to_uppercase(),
        None => return Ok((None, Money::zero())),
    };

    let amount = codes
        .iter()
        .find(|(k, _)| k.to_uppercase() == code)
        .map(|(_, v)| Money::from_amount(*v))
        .ok_or_else(|| CoreError::UnknownDiscountCode(code.clone()))?;

    let amount = if amount > subtotal { subtotal } else { amount };
    Ok((Some(code), amount))
}

/// Prices a self-service order. Prices always come from the product and
/// line discounts do not apply.
pub fn price_order(
    lines: &[OrderLine],
    products: &HashMap<String, Product>,
    shipping_fee: i64,
    discount_code: Option<&str>,
    codes: &HashMap<String, i64>,
) -> CoreResult<PricedOrder> {
    let cart: Vec<CartLine> = lines
        .iter()
        .map(|l| CartLine::new(l.product_id.clone(), l.quantity))
        .collect();
    let cart = merge_lines(&cart);
    check_cart_shape(cart.len())?;

    let mut priced = Vec::with_capacity(cart.len());
    for line in &cart {
        priced.push(price_line(line, products)?);
    }

    let subtotal = checked_total("subtotal", priced.iter().map(|l| Some(l.line_total)))?;
    validate_amount("shipping fee", shipping_fee)?;
    let shipping_fee = Money::from_amount(shipping_fee);
    let (discount_code, discount_amount) = resolve_discount(discount_code, codes, subtotal)?;
    let total = checked_total("total", [Some(subtotal), Some(shipping_fee)].into_iter())?
        - discount_amount;

    Ok(PricedOrder {
        lines: priced,
        subtotal,
        shipping_fee,
        discount_code,
        discount_amount,
        total,
    })
}

/// Rejects a checkout request whose header fields are unusable.
pub fn validate_checkout_request(request: &CheckoutRequest) -> CoreResult<()> {
    validate_name("customer name", &request.customer_name)?;
    validate_amount("amount paid", request.amount_paid)?;
    validate_amount("overall discount", request.overall_discount)?;
    Ok(())
}

/// Adds up amounts, failing with `Overflow` if any term or the running sum
/// leaves the `i64` range.
fn checked_total(
    field: &str,
    mut amounts: impl Iterator<Item = Option<Money>>,
) -> CoreResult<Money> {
    amounts
        .try_fold(Money::zero(), |acc, amount| amount.and_then(|a| acc.checked_add(a)))
        .ok_or_else(|| {
            ValidationError::Overflow {
                field: field.to_string(),
            }
            .into()
        })
}

fn check_cart_shape(lines: usize) -> CoreResult<()> {
    if lines == 0 {
        return Err(CoreError::EmptyCart);
    }
    if lines > MAX_CART_LINES {
        return Err(CoreError::CartTooLarge {
            max: MAX_CART_LINES,
        });
    }
    Ok(())
}

fn price_line(line: &CartLine, products: &HashMap<String, Product>) -> CoreResult<PricedLine> {
    if line.quantity <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        }
        .into());
    }
    if line.quantity > MAX_ITEM_QUANTITY {
        return Err(CoreError::QuantityTooLarge {
            requested: line.quantity,
            max: MAX_ITEM_QUANTITY,
        });
    }

    let product = products
        .get(&line.product_id)
        .ok_or_else(|| CoreError::ProductNotFound(line.product_id.clone()))?;

    if !product.can_fulfil(line.quantity) {
        return Err(CoreError::InsufficientStock {
            product: product.label(),
            available: product.quantity,
            requested: line.quantity,
        });
    }

    let unit_price = match line.unit_price {
        Some(price) => {
            validate_amount("unit price", price)?;
            Money::from_amount(price)
        }
        None => product.sell_price(),
    };

    validate_amount("discount", line.discount)?;
    let gross = unit_price
        .checked_multiply_quantity(line.quantity)
        .ok_or_else(|| ValidationError::Overflow {
            field: "line total".to_string(),
        })?;
    let cap = product.discount_cap(line.quantity).min(gross);
    let discount = Money::from_amount(line.discount);
    if discount > cap {
        return Err(CoreError::DiscountExceedsCap {
            product: product.label(),
            max: cap.amount(),
            requested: line.discount,
        });
    }

    Ok(PricedLine {
        product_id: product.id.clone(),
        name: product.name.clone(),
        color: product.color.clone(),
        size: product.size.clone(),
        unit: product.unit.clone(),
        unit_price,
        quantity: line.quantity,
        discount,
        note: line.note.clone(),
        line_total: gross - discount,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn product(id: &str, name: &str, stock: i64, price: i64, cap: Option<i64>) -> Product {
        Product {
            id: id.to_string(),
            name: name.to_string(),
            color: "white".to_string(),
            quality: "A".to_string(),
            size: "50cm".to_string(),
            unit: "stem".to_string(),
            quantity: stock,
            sell_price: price,
            cost_price: price / 2,
            max_discount_per_unit: cap,
            image_url: None,
            version: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn catalog() -> HashMap<String, Product> {
        [
            product("rose", "Rose", 5, 10_000, Some(1_000)),
            product("lily", "Lily", 4, 25_000, None),
            product("tulip", "Tulip", 50, 15_000, Some(2_000)),
        ]
        .into_iter()
        .map(|p| (p.id.clone(), p))
        .collect()
    }

    #[test]
    fn test_rose_scenario_totals() {
        let line = CartLine {
            unit_price: Some(10_000),
            ..CartLine::new("rose", 3)
        };
        let priced = price_cart(&[line], &catalog(), 0, PaymentMethod::Cash, 30_000).unwrap();

        assert_eq!(priced.subtotal.amount(), 30_000);
        assert_eq!(priced.total.amount(), 30_000);
        assert!(priced.debt.is_zero());
        assert_eq!(priced.lines[0].name, "Rose");
    }

    #[test]
    fn test_lily_scenario_rejected_for_stock() {
        let err = price_cart(
            &[CartLine::new("lily", 10)],
            &catalog(),
            0,
            PaymentMethod::Cash,
            0,
        )
        .unwrap_err();

        assert!(matches!(
            err,
            CoreError::InsufficientStock {
                available: 4,
                requested: 10,
                ..
            }
        ));
    }

    #[test]
    fn test_total_formula_with_discounts() {
        let lines = vec![
            CartLine {
                discount: 3_000,
                ..CartLine::new("rose", 3)
            },
            CartLine {
                discount: 4_000,
                ..CartLine::new("tulip", 2)
            },
        ];
        let priced = price_cart(&lines, &catalog(), 5_000, PaymentMethod::Cash, 100_000).unwrap();

        // 30_000 + 30_000 − (3_000 + 4_000) − 5_000
        assert_eq!(priced.subtotal.amount(), 60_000);
        assert_eq!(priced.items_discount.amount(), 7_000);
        assert_eq!(priced.total.amount(), 48_000);
        assert_eq!(priced.lines[1].line_total.amount(), 26_000);
    }

    #[test]
    fn test_discount_cap() {
        let over_cap = CartLine {
            discount: 3_001,
            ..CartLine::new("rose", 3)
        };
        assert!(matches!(
            price_cart(&[over_cap], &catalog(), 0, PaymentMethod::Cash, 0),
            Err(CoreError::DiscountExceedsCap { max: 3_000, .. })
        ));

        // no configured cap means no discount at all
        let uncapped = CartLine {
            discount: 1,
            ..CartLine::new("lily", 1)
        };
        assert!(matches!(
            price_cart(&[uncapped], &catalog(), 0, PaymentMethod::Cash, 0),
            Err(CoreError::DiscountExceedsCap { max: 0, .. })
        ));
    }

    #[test]
    fn test_overall_discount_cannot_exceed_remaining() {
        let err = price_cart(
            &[CartLine::new("rose", 1)],
            &catalog(),
            10_001,
            PaymentMethod::Cash,
            0,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn test_underpayment_becomes_debt() {
        let priced = price_cart(
            &[CartLine::new("tulip", 4)],
            &catalog(),
            0,
            PaymentMethod::BankTransfer,
            20_000,
        )
        .unwrap();
        assert_eq!(priced.total.amount(), 60_000);
        assert_eq!(priced.debt.amount(), 40_000);

        let overpaid = settle_payment(Money::from_amount(10_000), PaymentMethod::Cash, 50_000).unwrap();
        assert!(overpaid.debt.is_zero());
    }

    #[test]
    fn test_card_requires_full_payment() {
        let err = price_cart(
            &[CartLine::new("tulip", 1)],
            &catalog(),
            0,
            PaymentMethod::Card,
            10_000,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::PartialPaymentNotAllowed { .. }));

        assert!(price_cart(
            &[CartLine::new("tulip", 1)],
            &catalog(),
            0,
            PaymentMethod::Card,
            15_000
        )
        .is_ok());
    }

    #[test]
    fn test_duplicate_lines_are_merged_before_stock_check() {
        let lines = vec![CartLine::new("rose", 3), CartLine::new("rose", 3)];
        let err = price_cart(&lines, &catalog(), 0, PaymentMethod::Cash, 0).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InsufficientStock { requested: 6, .. }
        ));

        let merged = merge_lines(&[
            CartLine::new("rose", 1),
            CartLine::new("tulip", 2),
            CartLine::new("rose", 2),
        ]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].quantity, 3);
    }

    #[test]
    fn test_cart_shape_errors() {
        assert_eq!(
            price_cart(&[], &catalog(), 0, PaymentMethod::Cash, 0),
            Err(CoreError::EmptyCart)
        );
        assert!(matches!(
            price_cart(&[CartLine::new("rose", 0)], &catalog(), 0, PaymentMethod::Cash, 0),
            Err(CoreError::Validation(_))
        ));
        assert!(matches!(
            price_cart(
                &[CartLine::new("tulip", MAX_ITEM_QUANTITY + 1)],
                &catalog(),
                0,
                PaymentMethod::Cash,
                0
            ),
            Err(CoreError::QuantityTooLarge { .. })
        ));
        assert_eq!(
            price_cart(&[CartLine::new("orchid", 1)], &catalog(), 0, PaymentMethod::Cash, 0),
            Err(CoreError::ProductNotFound("orchid".into()))
        );
    }

    #[test]
    fn test_oversized_amounts_are_rejected_not_wrapped() {
        let inflated = CartLine {
            unit_price: Some(i64::MAX / 2),
            ..CartLine::new("rose", 3)
        };
        assert!(matches!(
            price_cart(&[inflated], &catalog(), 0, PaymentMethod::Cash, 0),
            Err(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));

        let split = vec![CartLine::new("rose", i64::MAX), CartLine::new("rose", 1)];
        assert!(matches!(
            price_cart(&split, &catalog(), 0, PaymentMethod::Cash, 0),
            Err(CoreError::QuantityTooLarge { requested: i64::MAX, .. })
        ));

        let discounts = vec![
            CartLine {
                discount: i64::MAX,
                ..CartLine::new("tulip", 1)
            },
            CartLine {
                discount: 1,
                ..CartLine::new("tulip", 1)
            },
        ];
        assert!(matches!(
            price_cart(&discounts, &catalog(), 0, PaymentMethod::Cash, 0),
            Err(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));

        assert!(matches!(
            price_cart(&[CartLine::new("rose", 1)], &catalog(), i64::MAX, PaymentMethod::Cash, 0),
            Err(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));
    }

    #[test]
    fn test_stored_price_overflow_is_reported() {
        let mut products = catalog();
        if let Some(rose) = products.get_mut("rose") {
            rose.sell_price = i64::MAX / 2;
        }
        assert_eq!(
            price_cart(&[CartLine::new("rose", 3)], &products, 0, PaymentMethod::Cash, 0),
            Err(CoreError::Validation(ValidationError::Overflow {
                field: "line total".into()
            }))
        );

        let lines = vec![
            OrderLine {
                product_id: "rose".into(),
                quantity: 1,
            },
            OrderLine {
                product_id: "tulip".into(),
                quantity: 1,
            },
        ];
        if let Some(rose) = products.get_mut("rose") {
            rose.sell_price = i64::MAX;
        }
        assert_eq!(
            price_order(&lines, &products, 0, None, &HashMap::new()),
            Err(CoreError::Validation(ValidationError::Overflow {
                field: "subtotal".into()
            }))
        );
    }

    #[test]
    fn test_price_order_with_discount_code() {
        let codes = HashMap::from([("SPRING10".to_string(), 10_000)]);
        let lines = vec![OrderLine {
            product_id: "tulip".into(),
            quantity: 2,
        }];

        let priced = price_order(&lines, &catalog(), 30_000, Some(" spring10 "), &codes).unwrap();
        assert_eq!(priced.subtotal.amount(), 30_000);
        assert_eq!(priced.discount_code.as_deref(), Some("SPRING10"));
        assert_eq!(priced.total.amount(), 50_000);

        assert_eq!(
            price_order(&lines, &catalog(), 0, Some("BOGUS"), &codes).unwrap_err(),
            CoreError::UnknownDiscountCode("BOGUS".into())
        );
    }

    #[test]
    fn test_discount_code_capped_at_subtotal() {
        let codes = HashMap::from([("BIG".to_string(), 1_000_000)]);
        let (_, amount) = resolve_discount(Some("big"), &codes, Money::from_amount(40_000)).unwrap();
        assert_eq!(amount.amount(), 40_000);

        let (code, amount) = resolve_discount(Some("  "), &codes, Money::from_amount(1)).unwrap();
        assert!(code.is_none());
        assert!(amount.is_zero());
    }
}
