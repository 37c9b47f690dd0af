//! Value marshaling
//!
//! Conversion rules per reference kind:
//!
//! | kind              | objects                        | primitives / lists / maps        |
//! |-------------------|--------------------------------|----------------------------------|
//! | `T`               | copied (`dup`) before the call | copied, never written back       |
//! | `T &`             | aliased, nil rejected          | written back to a box, list, map |
//! | `const T &`       | aliased through a const view   | copied, never written back       |
//! | `T *`             | aliased, nil accepted          | written back to a box, list, map |
//! | `const T *`       | const view, nil accepted       | copied, never written back       |
//!
//! Integers are truncated to the declared native width with two's complement
//! wraparound; they never fail on overflow.

use std::rc::Rc;

use bindery_sdk::{
    BindError, BindResult, EnumValue, FlagSet, IntType, ObjectHandle, ValueBox, Variant,
    VariantMap,
};

use crate::class::signature::{ParamSpec, ParamType, RefKind, ReturnType};
use crate::class::{ClassKind, ClassRegistry};
use crate::registry::{Constness, InstanceRegistry, Keep};
use crate::resolve::{ArgSource, CallArgs};
use crate::runtime::Runtime;

/// Why a single value failed to convert
#[derive(Debug, Clone, PartialEq)]
pub enum ArgFailure {
    /// Wrong type; names are host-facing type names
    Mismatch {
        /// Declared type
        expected: String,
        /// Type of the value given
        actual: String,
    },
    /// The value is a handle to a destroyed instance
    Destroyed {
        /// Class of the stale handle
        class: String,
    },
    /// A const view given where a mutable reference is required
    ConstObject,
}

fn mismatch(ty: &ParamType, value: &Variant) -> ArgFailure {
    ArgFailure::Mismatch {
        expected: ty.name(),
        actual: value.type_name(),
    }
}

/// The value a parameter takes when a box holds nil
pub fn default_for(ty: &ParamType) -> Variant {
    match ty {
        ParamType::Bool => Variant::Bool(false),
        ParamType::Int(it) => it.wrap(0),
        ParamType::Double => Variant::Float(0.0),
        ParamType::String => Variant::String(String::new()),
        ParamType::Bytes => Variant::Bytes(Vec::new()),
        ParamType::Enum(decl) => Variant::Enum(EnumValue::default_for(decl)),
        ParamType::Flags(decl) => Variant::Flags(FlagSet::empty(decl)),
        ParamType::List(_) => Variant::List(Vec::new()),
        ParamType::Map(..) => Variant::Map(VariantMap::new()),
        ParamType::Object(_) | ParamType::Any => Variant::Nil,
    }
}

fn wrap_int(it: IntType, value: &Variant) -> Option<(Variant, u32)> {
    match value {
        Variant::Int(i) => Some((it.wrap(i128::from(*i)), 0)),
        Variant::UInt(u) => Some((it.wrap(i128::from(*u)), 0)),
        Variant::Float(f) if f.is_finite() => Some((it.wrap(f.trunc() as i128), 1)),
        Variant::Enum(e) => Some((it.wrap(i128::from(e.to_i())), 1)),
        Variant::Flags(fl) => Some((it.wrap(i128::from(fl.to_i())), 1)),
        _ => None,
    }
}

/// Convert a value to a declared parameter type
///
/// Returns the converted value and its cost: 0 for an exact match, 1 when
/// an implicit conversion was needed.
pub fn convert_value(
    classes: &ClassRegistry,
    instances: &InstanceRegistry,
    ty: &ParamType,
    kind: RefKind,
    value: &Variant,
) -> Result<(Variant, u32), ArgFailure> {
    if *ty == ParamType::Any {
        return Ok((value.clone(), 0));
    }
    if let Variant::Boxed(b) = value {
        let inner = b.get();
        if inner.is_nil() {
            return match ty {
                _ if kind.is_nullable() => Ok((Variant::Nil, 0)),
                ParamType::Object(_) => Err(mismatch(ty, &inner)),
                _ => Ok((default_for(ty), 0)),
            };
        }
        return convert_value(classes, instances, ty, kind, &inner);
    }
    if value.is_nil() {
        return if kind.is_nullable() {
            Ok((Variant::Nil, 0))
        } else {
            Err(mismatch(ty, value))
        };
    }

    let converted = match (ty, value) {
        (ParamType::Bool, Variant::Bool(b)) => Some((Variant::Bool(*b), 0)),
        (ParamType::Int(it), v) => wrap_int(*it, v),
        (ParamType::Double, Variant::Float(f)) => Some((Variant::Float(*f), 0)),
        (ParamType::Double, Variant::Int(i)) => Some((Variant::Float(*i as f64), 1)),
        (ParamType::Double, Variant::UInt(u)) => Some((Variant::Float(*u as f64), 1)),
        (ParamType::String, Variant::String(s)) => Some((Variant::String(s.clone()), 0)),
        (ParamType::String, Variant::Bytes(b)) => std::str::from_utf8(b)
            .ok()
            .map(|s| (Variant::String(s.to_string()), 1)),
        (ParamType::Bytes, Variant::Bytes(b)) => Some((Variant::Bytes(b.clone()), 0)),
        (ParamType::Bytes, Variant::String(s)) => Some((Variant::bytes(s.as_bytes()), 1)),
        (ParamType::Enum(decl), Variant::Enum(e)) if e.decl().name() == decl.name() => {
            Some((Variant::Enum(EnumValue::new(decl, e.to_i())), 0))
        }
        (ParamType::Enum(decl), v) => v
            .as_i64()
            .map(|i| (Variant::Enum(EnumValue::new(decl, i)), 1)),
        (ParamType::Flags(decl), Variant::Flags(f)) if f.decl().name() == decl.name() => {
            Some((Variant::Flags(FlagSet::new(decl, f.to_i())), 0))
        }
        (ParamType::Flags(decl), Variant::Enum(e)) if e.decl().name() == decl.name() => {
            Some((Variant::Flags(FlagSet::new(decl, e.to_i())), 1))
        }
        (ParamType::Flags(decl), v) => v
            .as_i64()
            .map(|i| (Variant::Flags(FlagSet::new(decl, i)), 1)),
        (ParamType::List(item), Variant::List(items)) => {
            let mut out = Vec::with_capacity(items.len());
            let mut cost = 0;
            for element in items {
                let (v, c) = convert_value(classes, instances, item, RefKind::Value, element)
                    .map_err(|_| mismatch(ty, value))?;
                cost = cost.max(c);
                out.push(v);
            }
            Some((Variant::List(out), cost))
        }
        (ParamType::Map(kt, vt), Variant::Map(map)) => {
            let mut out = VariantMap::new();
            let mut cost = 0;
            for (k, v) in map.iter() {
                let (k, kc) = convert_value(classes, instances, kt, RefKind::Value, k)
                    .map_err(|_| mismatch(ty, value))?;
                let (v, vc) = convert_value(classes, instances, vt, RefKind::Value, v)
                    .map_err(|_| mismatch(ty, value))?;
                cost = cost.max(kc).max(vc);
                out.insert(k, v);
            }
            Some((Variant::Map(out), cost))
        }
        (ParamType::Object(class), Variant::Object(h)) => {
            return convert_object(classes, instances, class, kind, h);
        }
        _ => None,
    };
    converted.ok_or_else(|| mismatch(ty, value))
}

fn convert_object(
    classes: &ClassRegistry,
    instances: &InstanceRegistry,
    class: &str,
    kind: RefKind,
    h: &ObjectHandle,
) -> Result<(Variant, u32), ArgFailure> {
    if instances.is_destroyed(h) {
        return Err(ArgFailure::Destroyed {
            class: h.class_name().to_string(),
        });
    }
    let mismatch = || ArgFailure::Mismatch {
        expected: class.to_string(),
        actual: h.class_name().to_string(),
    };
    let expected = classes.lookup(class).ok_or_else(mismatch)?;
    let cost = if h.class() == expected {
        0
    } else if classes.is_subclass_of(h.class(), expected) {
        1
    } else {
        return Err(mismatch());
    };
    if kind.writes_back() && h.is_const() {
        return Err(ArgFailure::ConstObject);
    }
    Ok((Variant::Object(h.clone()), cost))
}

impl Runtime {
    /// Apply the side effects of passing converted arguments into a call:
    /// by-value objects are copied, const kinds get const views.
    pub(crate) fn prepare_args(
        &mut self,
        params: &[ParamSpec],
        values: Vec<Variant>,
    ) -> BindResult<Vec<Variant>> {
        params
            .iter()
            .zip(values)
            .map(|(param, value)| match (&param.ty, value) {
                (ParamType::Object(_), Variant::Object(h)) => Ok(Variant::Object(match param.kind {
                    RefKind::Value => self.dup(&h)?,
                    RefKind::ConstRef | RefKind::ConstPtr => h.as_const(),
                    RefKind::Ref | RefKind::Ptr => h,
                })),
                (_, value) => Ok(value),
            })
            .collect()
    }

    /// Copy mutated out-parameters back into the caller's boxes, lists and maps
    pub(crate) fn write_back(
        params: &[ParamSpec],
        sources: &[ArgSource],
        updated: &[Variant],
        args: &mut CallArgs,
    ) {
        for ((param, source), value) in params.iter().zip(sources).zip(updated) {
            if !param.kind.writes_back() || matches!(param.ty, ParamType::Object(_)) {
                continue;
            }
            let Some(original) = args.source_value_mut(*source) else {
                continue;
            };
            match original {
                Variant::Boxed(b) => b.set(value.clone()),
                Variant::List(_) | Variant::Map(_) => *original = value.clone(),
                _ => {}
            }
        }
    }

    /// Wrap mutable primitive references in boxes for a host override
    pub(crate) fn outward_args(params: &[ParamSpec], values: &[Variant]) -> Vec<Variant> {
        params
            .iter()
            .zip(values)
            .map(|(param, value)| {
                if param.kind.writes_back() && !matches!(param.ty, ParamType::Object(_)) {
                    Variant::Boxed(ValueBox::new(value.clone()))
                } else {
                    value.clone()
                }
            })
            .collect()
    }

    /// Read back boxes handed to a host override
    pub(crate) fn inward_args(outward: &[Variant], values: &mut [Variant]) {
        for (sent, value) in outward.iter().zip(values.iter_mut()) {
            if let Variant::Boxed(b) = sent {
                *value = b.get();
            }
        }
    }

    /// Convert a native (or override) result to what the caller receives
    pub(crate) fn marshal_return(
        &mut self,
        ret: &ReturnType,
        value: Variant,
        owner: &str,
        method: &str,
    ) -> BindResult<Variant> {
        let (ty, kind) = match ret {
            ReturnType::Void => return Ok(Variant::Nil),
            ReturnType::Value(ty, kind) => (ty, *kind),
        };
        self.marshal_out(ty, kind, value, owner, method)
    }

    fn marshal_out(
        &mut self,
        ty: &ParamType,
        kind: RefKind,
        value: Variant,
        owner: &str,
        method: &str,
    ) -> BindResult<Variant> {
        match (ty, value) {
            (ParamType::Any, value) => Ok(value),
            (ParamType::Object(_), Variant::Nil) if kind.is_nullable() => Ok(Variant::Nil),
            (ParamType::Object(_), Variant::Nil) => Err(BindError::NullReference {
                what: "return value".to_string(),
                class: owner.to_string(),
                method: method.to_string(),
            }),
            (ParamType::Object(class), Variant::Object(h)) => {
                let expected = self.classes.require(class)?;
                if !self.classes.is_subclass_of(h.class(), expected) {
                    return Err(BindError::UnexpectedValue {
                        expected: class.clone(),
                        actual: h.class_name().to_string(),
                    });
                }
                let keep = self.instances.resolve(&h, method)?.keep();
                let handle = match kind {
                    RefKind::Value => {
                        let fresh = keep == Keep::Managed
                            && !h.is_const()
                            && Rc::strong_count(h.proxy()) == 1
                            && Rc::strong_count(h.anchor()) == 1;
                        if fresh {
                            h
                        } else {
                            self.dup(&h)?
                        }
                    }
                    RefKind::Ref | RefKind::Ptr => self.issue(&h, Constness::NonConst)?,
                    // No host holder yet: the proxy itself becomes const, so
                    // a later non-const crossing flips every alias back.
                    RefKind::ConstRef | RefKind::ConstPtr
                        if self.classes.get(h.class()).map(|c| c.kind()) == Some(ClassKind::Object)
                            && Rc::strong_count(h.proxy()) == 1 =>
                    {
                        h.proxy().set_const(true);
                        h
                    }
                    RefKind::ConstRef | RefKind::ConstPtr => self.issue(&h, Constness::Const)?,
                };
                Ok(Variant::Object(handle))
            }
            (ParamType::List(item), Variant::List(items)) => items
                .into_iter()
                .map(|v| self.marshal_out(item, kind, v, owner, method))
                .collect::<BindResult<Vec<_>>>()
                .map(Variant::List),
            (ty, value) => convert_value(&self.classes, &self.instances, ty, RefKind::Value, &value)
                .map(|(v, _)| v)
                .map_err(|_| BindError::UnexpectedValue {
                    expected: ty.name(),
                    actual: value.type_name(),
                }),
        }
    }
}
