//! Property tests for the row codec, casts and the evaluator.

use std::cmp::Ordering;

use jogasaki_sql::codec::{CodingSpec, FieldOp, Order, RecordCodec};
use jogasaki_sql::conv::{cast, CastContext};
use jogasaki_sql::data::{TimePoint, Triple, Value};
use jogasaki_sql::expr::{evaluate, BinaryOperator, EvalContext, Expression, Scope};
use jogasaki_sql::meta::FieldType;
use proptest::prelude::*;

fn key_types() -> [FieldType; 3] {
    [
        FieldType::Int8,
        FieldType::varchar(None),
        FieldType::decimal(None, None),
    ]
}

fn key_codec(orders: [Order; 3]) -> RecordCodec {
    let ops = key_types()
        .into_iter()
        .zip(orders)
        .enumerate()
        .map(|(i, (ty, order))| FieldOp::new(i, ty, true, CodingSpec::key(order)).unwrap())
        .collect();
    RecordCodec::new(ops)
}

fn encode(codec: &RecordCodec, row: &[Value]) -> Vec<u8> {
    let mut buf = Vec::new();
    codec.encode_to_vec(row, &mut buf).unwrap();
    buf
}

/// NULL first in either direction; values ordered by direction.
fn compare_rows(a: &[Value], b: &[Value], orders: [Order; 3]) -> Ordering {
    for ((x, y), order) in a.iter().zip(b).zip(orders) {
        let ord = match (x.is_null(), y.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => {
                let ord = x.compare(y).unwrap();
                match order {
                    Order::Ascending => ord,
                    Order::Descending => ord.reverse(),
                }
            }
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn same_value(a: &Value, b: &Value) -> bool {
    match (a.is_null(), b.is_null()) {
        (true, true) => true,
        (false, false) => a.compare(b) == Some(Ordering::Equal),
        _ => false,
    }
}

fn order_strategy() -> impl Strategy<Value = Order> {
    prop_oneof![Just(Order::Ascending), Just(Order::Descending)]
}

fn decimal_strategy() -> impl Strategy<Value = Triple> {
    (any::<bool>(), 0u128..1_000_000_000_000, -8i32..8)
        .prop_map(|(neg, coef, exp)| Triple::new(if neg { -1 } else { 1 }, coef, exp))
}

fn row_strategy() -> impl Strategy<Value = Vec<Value>> {
    (
        proptest::option::of(any::<i64>()),
        proptest::option::of("[a-c\\x00]{0,6}"),
        proptest::option::of(decimal_strategy()),
    )
        .prop_map(|(i, s, d)| vec![Value::from(i), Value::from(s), Value::from(d)])
}

proptest! {
    #[test]
    fn prop_key_encoding_preserves_order(
        a in row_strategy(),
        b in row_strategy(),
        orders in [order_strategy(), order_strategy(), order_strategy()],
    ) {
        let codec = key_codec(orders);
        let logical = compare_rows(&a, &b, orders);
        let physical = encode(&codec, &a).cmp(&encode(&codec, &b));
        prop_assert_eq!(logical, physical);
    }

    #[test]
    fn prop_key_round_trip(row in row_strategy(), orders in [order_strategy(), order_strategy(), order_strategy()]) {
        let codec = key_codec(orders);
        let decoded = codec.decode_values(&encode(&codec, &row)).unwrap();
        prop_assert_eq!(decoded.len(), row.len());
        for (x, y) in decoded.iter().zip(&row) {
            prop_assert!(same_value(x, y), "{:?} != {:?}", x, y);
        }
    }

    #[test]
    fn prop_value_round_trip(row in row_strategy(), f in proptest::option::of(-1.0e300f64..1.0e300)) {
        let mut types = key_types().to_vec();
        types.push(FieldType::Float8);
        let codec = RecordCodec::new(
            types
                .into_iter()
                .enumerate()
                .map(|(i, ty)| FieldOp::new(i, ty, true, CodingSpec::VALUE).unwrap())
                .collect(),
        );
        let mut row = row;
        row.push(Value::from(f));
        let decoded = codec.decode_values(&encode(&codec, &row)).unwrap();
        prop_assert_eq!(decoded.len(), row.len());
        for (x, y) in decoded.iter().zip(&row) {
            prop_assert!(same_value(x, y), "{:?} != {:?}", x, y);
        }
    }

    #[test]
    fn prop_time_point_round_trips_exactly(seconds in any::<i64>(), nanos in 0u32..1_000_000_000) {
        let tp = TimePoint::new(seconds, nanos);
        let ty = FieldType::time_point(false);
        for spec in [CodingSpec::key(Order::Ascending), CodingSpec::key(Order::Descending), CodingSpec::VALUE] {
            let codec = RecordCodec::new(vec![FieldOp::new(0, ty.clone(), false, spec).unwrap()]);
            let decoded = codec.decode_values(&encode(&codec, &[Value::TimePoint(tp)])).unwrap();
            prop_assert_eq!(&decoded, &vec![Value::TimePoint(tp)]);
            if let Value::TimePoint(back) = &decoded[0] {
                prop_assert_eq!((back.seconds(), back.subsecond_nanos()), (seconds, nanos));
            }
        }
    }

    #[test]
    fn prop_integer_narrowing_saturates(v in any::<i64>()) {
        for (target, min, max) in [
            (FieldType::Int1, i64::from(i8::MIN), i64::from(i8::MAX)),
            (FieldType::Int2, i64::from(i16::MIN), i64::from(i16::MAX)),
            (FieldType::Int4, i64::from(i32::MIN), i64::from(i32::MAX)),
        ] {
            let mut ctx = CastContext::default();
            let out = cast(&Value::Int8(v), &target, &mut ctx).unwrap();
            prop_assert_eq!(out.as_i64(), Some(v.clamp(min, max)));
            prop_assert_eq!(ctx.lost_precision, v < min || v > max);
        }
    }

    #[test]
    fn prop_numeric_casts_are_monotonic(a in any::<i64>(), b in any::<i64>(), x in -1.0e20f64..1.0e20, y in -1.0e20f64..1.0e20) {
        let (a, b) = if a <= b { (a, b) } else { (b, a) };
        let (x, y) = if x <= y { (x, y) } else { (y, x) };
        let cases = [
            (Value::Int8(a), Value::Int8(b), FieldType::Float4),
            (Value::Int8(a), Value::Int8(b), FieldType::decimal(None, None)),
            (Value::Int8(a), Value::Int8(b), FieldType::Int2),
            (Value::Float8(x), Value::Float8(y), FieldType::Int8),
            (Value::Float8(x), Value::Float8(y), FieldType::Float4),
        ];
        for (lo, hi, target) in cases {
            let mut c1 = CastContext::default();
            let mut c2 = CastContext::default();
            let (Ok(lo), Ok(hi)) = (cast(&lo, &target, &mut c1), cast(&hi, &target, &mut c2)) else {
                continue;
            };
            if c1.lost_precision || c2.lost_precision {
                continue;
            }
            prop_assert_ne!(lo.compare(&hi), Some(Ordering::Greater), "{:?}", target);
        }
    }

    #[test]
    fn prop_null_propagates_through_arithmetic(v in any::<i32>(), left_null in any::<bool>()) {
        for op in [BinaryOperator::Add, BinaryOperator::Subtract, BinaryOperator::Multiply] {
            let (l, r) = if left_null {
                (Expression::immediate(Value::Null), Expression::immediate(v))
            } else {
                (Expression::immediate(v), Expression::immediate(Value::Null))
            };
            let expr = Expression::binary(op, l, r);
            let out = evaluate(&expr, &mut EvalContext::new(CastContext::default()), &Scope::new()).unwrap();
            prop_assert!(out.is_null());
        }
    }
}
