//! Host values embedded in ARD trees

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::core::Value;
use crate::error::ArdResult;
use crate::reflect::Reflector;

/// A host type that can be reflected into ARD
///
/// Implemented for every `Serialize + Send + Sync + 'static` type.
pub trait Reflectable: Send + Sync + 'static {
    /// Unpack into a value tree
    fn reflect(&self, reflector: &Reflector, string_maps: bool) -> ArdResult<Value>;

    /// Name of the concrete type, for diagnostics
    fn host_type_name(&self) -> &'static str;
}

impl<T> Reflectable for T
where
    T: Serialize + Send + Sync + 'static,
{
    fn reflect(&self, reflector: &Reflector, string_maps: bool) -> ArdResult<Value> {
        if string_maps {
            reflector.unpack_string_maps(self)
        } else {
            reflector.unpack(self)
        }
    }

    fn host_type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// Shared, immutable host value
///
/// Two host values are equal only when they share the same allocation.
#[derive(Clone)]
pub struct HostValue(Arc<dyn Reflectable>);

impl HostValue {
    /// Wrap a host value
    pub fn new<T>(value: T) -> Self
    where
        T: Serialize + Send + Sync + 'static,
    {
        Self(Arc::new(value))
    }

    /// Reflect the wrapped value into ARD
    ///
    /// # Errors
    ///
    /// Returns the reflector's error when the value has no ARD representative.
    pub fn unpack(&self, reflector: &Reflector, string_maps: bool) -> ArdResult<Value> {
        self.0.reflect(reflector, string_maps)
    }

    /// Name of the wrapped type
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.0.host_type_name()
    }

    /// Do both handles point at the same allocation?
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
    }

    /// Address of the shared allocation, used for hashing
    #[inline]
    #[must_use]
    pub fn ptr_id(&self) -> usize {
        Arc::as_ptr(&self.0).cast::<()>() as usize
    }
}

impl fmt::Debug for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HostValue").field(&self.type_name()).finish()
    }
}
