//! Interface and method descriptions
//!
//! An interface is a named set of methods, optionally extending other
//! interfaces. Each method is either abstract (executed by an engine) or
//! carries a built-in body supplied with the description.
//!
//! Methods are identified by [`MethodKey`]: declaring interface, name and
//! signature. Overloads share a name and differ by signature.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::{InvocationError, ProxyResult};
use crate::value::{ObjectId, TypeRef, Value};

/// Name of the universal base type every object answers to
pub const OBJECT_TYPE: &str = "Object";

/// Anything that can be called back by method name.
///
/// Built-in bodies receive the receiver they are bound to, and reach
/// sibling methods through it. A receiver may override methods; the body
/// bound to it never observes its own override.
pub trait Receiver {
    /// Identity of the receiver
    fn object_id(&self) -> ObjectId;

    /// Call a method by name
    fn call(&self, name: &str, args: &[Value]) -> ProxyResult<Value>;
}

/// Built-in method body
pub type DefaultBody = Arc<dyn Fn(&dyn Receiver, &[Value]) -> ProxyResult<Value> + Send + Sync>;

/// Declared accessibility of a method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Visibility {
    /// Reachable from anywhere
    #[default]
    Public,
    /// Reachable from the declaring type and its descendants
    Protected,
    /// Reachable from the declaring package
    Package,
    /// Reachable only from the declaring type
    Private,
}

impl Visibility {
    /// Lowercase name
    pub fn name(self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Protected => "protected",
            Visibility::Package => "package",
            Visibility::Private => "private",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parameter and return types of a method
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    /// Parameter types in order
    pub params: Vec<TypeRef>,
    /// Return type
    pub ret: TypeRef,
}

impl Signature {
    /// Create a signature
    pub fn new(params: impl IntoIterator<Item = TypeRef>, ret: TypeRef) -> Self {
        Self {
            params: params.into_iter().collect(),
            ret,
        }
    }

    /// Number of parameters
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Whether the arguments fit the parameters
    pub fn accepts(&self, args: &[Value]) -> bool {
        args.len() == self.params.len()
            && self.params.iter().zip(args).all(|(ty, arg)| ty.accepts(arg))
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", param)?;
        }
        write!(f, ") -> {}", self.ret)
    }
}

/// Identity of a method: declaring interface, name, signature
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodKey {
    declaring: Arc<str>,
    name: Arc<str>,
    signature: Signature,
}

impl MethodKey {
    /// Create a key
    pub fn new(declaring: &str, name: &str, signature: Signature) -> Self {
        Self {
            declaring: Arc::from(declaring),
            name: Arc::from(name),
            signature,
        }
    }

    /// Declaring interface name
    pub fn declaring(&self) -> &str {
        &self.declaring
    }

    /// Method name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Method signature
    pub fn signature(&self) -> &Signature {
        &self.signature
    }
}

impl fmt::Display for MethodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{}", self.declaring, self.name, self.signature)
    }
}

/// Description of a single method
#[derive(Clone)]
pub struct MethodDescriptor {
    key: MethodKey,
    visibility: Visibility,
    body: Option<DefaultBody>,
}

impl MethodDescriptor {
    /// An abstract method, executed by an engine
    pub fn abstract_method(declaring: &str, name: &str, signature: Signature) -> Self {
        Self {
            key: MethodKey::new(declaring, name, signature),
            visibility: Visibility::Public,
            body: None,
        }
    }

    /// A method carrying a built-in body
    pub fn default_method<F>(declaring: &str, name: &str, signature: Signature, body: F) -> Self
    where
        F: Fn(&dyn Receiver, &[Value]) -> ProxyResult<Value> + Send + Sync + 'static,
    {
        Self {
            key: MethodKey::new(declaring, name, signature),
            visibility: Visibility::Public,
            body: Some(Arc::new(body)),
        }
    }

    /// Set the declared visibility
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Method identity
    pub fn key(&self) -> &MethodKey {
        &self.key
    }

    /// Declaring interface name
    pub fn declaring(&self) -> &str {
        self.key.declaring()
    }

    /// Method name
    pub fn name(&self) -> &str {
        self.key.name()
    }

    /// Method signature
    pub fn signature(&self) -> &Signature {
        self.key.signature()
    }

    /// Declared visibility
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// Whether the method carries a built-in body
    pub fn is_default(&self) -> bool {
        self.body.is_some()
    }

    /// The built-in body, if any
    pub fn body(&self) -> Option<&DefaultBody> {
        self.body.as_ref()
    }

    /// Whether the method belongs to the universal base type
    pub fn is_object_method(&self) -> bool {
        self.declaring() == OBJECT_TYPE
    }

    /// Check a call's arguments against the signature.
    ///
    /// Arity is always checked; parameter types only when `check_types`.
    pub fn check_arguments(
        &self,
        args: &[Value],
        check_types: bool,
    ) -> Result<(), InvocationError> {
        let signature = self.signature();
        if args.len() != signature.arity() {
            return Err(InvocationError::ArityMismatch {
                method: self.to_string(),
                expected: signature.arity(),
                got: args.len(),
            });
        }
        if !check_types {
            return Ok(());
        }
        match signature
            .params
            .iter()
            .zip(args)
            .enumerate()
            .find(|(_, (ty, arg))| !ty.accepts(arg))
        {
            Some((index, (expected, arg))) => Err(InvocationError::ArgumentType {
                method: self.to_string(),
                index,
                expected: *expected,
                got: arg.type_ref(),
            }),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("key", &self.key)
            .field("visibility", &self.visibility)
            .field("default", &self.is_default())
            .finish()
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key)
    }
}

/// Methods of the universal base type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectMethod {
    /// `equals(object) -> bool`
    Equals,
    /// `hash_code() -> int`
    HashCode,
    /// `to_string() -> str`
    ToString,
}

impl ObjectMethod {
    /// All base-type methods
    pub const ALL: [ObjectMethod; 3] = [
        ObjectMethod::Equals,
        ObjectMethod::HashCode,
        ObjectMethod::ToString,
    ];

    /// Method name
    pub fn name(self) -> &'static str {
        match self {
            ObjectMethod::Equals => "equals",
            ObjectMethod::HashCode => "hash_code",
            ObjectMethod::ToString => "to_string",
        }
    }

    /// Method signature
    pub fn signature(self) -> Signature {
        match self {
            ObjectMethod::Equals => Signature::new([TypeRef::Any], TypeRef::Bool),
            ObjectMethod::HashCode => Signature::new([], TypeRef::Int),
            ObjectMethod::ToString => Signature::new([], TypeRef::Str),
        }
    }

    /// Full descriptor, declared by [`OBJECT_TYPE`]
    pub fn descriptor(self) -> MethodDescriptor {
        MethodDescriptor::abstract_method(OBJECT_TYPE, self.name(), self.signature())
    }

    /// Classify a method as a base-type method
    pub fn of(method: &MethodDescriptor) -> Option<Self> {
        if !method.is_object_method() {
            return None;
        }
        Self::ALL
            .into_iter()
            .find(|m| m.name() == method.name() && m.signature() == *method.signature())
    }

    /// Find a base-type method by name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }
}

/// Description of an interface
pub struct InterfaceDescriptor {
    name: Arc<str>,
    parents: Vec<Arc<InterfaceDescriptor>>,
    methods: Vec<Arc<MethodDescriptor>>,
    /// Method name to indices into `methods` (one per overload)
    method_indices: FxHashMap<String, Vec<usize>>,
}

impl InterfaceDescriptor {
    /// Start describing an interface
    pub fn builder(name: &str) -> InterfaceBuilder {
        InterfaceBuilder {
            name: name.to_string(),
            parents: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Interface name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directly extended interfaces
    pub fn parents(&self) -> &[Arc<InterfaceDescriptor>] {
        &self.parents
    }

    /// Methods declared by this interface itself
    pub fn methods(&self) -> &[Arc<MethodDescriptor>] {
        &self.methods
    }

    /// Overloads declared here under `name`
    pub fn declared_named(&self, name: &str) -> impl Iterator<Item = &Arc<MethodDescriptor>> {
        self.method_indices
            .get(name)
            .into_iter()
            .flatten()
            .map(move |&i| &self.methods[i])
    }

    /// Declared method with exactly this name and signature
    pub fn declared(&self, name: &str, signature: &Signature) -> Option<&Arc<MethodDescriptor>> {
        self.declared_named(name)
            .find(|m| m.signature() == signature)
    }

    /// This interface or the nearest ancestor with the given name
    pub fn ancestor(self: &Arc<Self>, name: &str) -> Option<Arc<InterfaceDescriptor>> {
        if self.name() == name {
            return Some(Arc::clone(self));
        }
        self.parents.iter().find_map(|p| p.ancestor(name))
    }

    /// Whether this interface is `name` or extends it
    pub fn extends(&self, name: &str) -> bool {
        self.name() == name || self.parents.iter().any(|p| p.extends(name))
    }

    /// Whether the method is declared here or by an ancestor
    pub fn has_method(&self, key: &MethodKey) -> bool {
        self.canonical(key).is_some()
    }

    /// The descriptor this interface (or an ancestor) declares under `key`.
    ///
    /// Descriptors built elsewhere may share a key while differing in kind;
    /// dispatch goes through the declared one.
    pub fn canonical(&self, key: &MethodKey) -> Option<Arc<MethodDescriptor>> {
        if key.declaring() == self.name() {
            return self.declared(key.name(), key.signature()).cloned();
        }
        self.parents.iter().find_map(|p| p.canonical(key))
    }

    /// Find a method by name whose signature accepts `args`.
    ///
    /// Own declarations shadow ancestors.
    pub fn find(&self, name: &str, args: &[Value]) -> Option<Arc<MethodDescriptor>> {
        if let Some(m) = self
            .declared_named(name)
            .find(|m| m.signature().accepts(args))
        {
            return Some(Arc::clone(m));
        }
        self.parents.iter().find_map(|p| p.find(name, args))
    }
}

impl fmt::Debug for InterfaceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterfaceDescriptor")
            .field("name", &self.name)
            .field(
                "parents",
                &self.parents.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .field("methods", &self.methods)
            .finish()
    }
}

/// Builder for [`InterfaceDescriptor`]
pub struct InterfaceBuilder {
    name: String,
    parents: Vec<Arc<InterfaceDescriptor>>,
    methods: Vec<MethodDescriptor>,
}

impl InterfaceBuilder {
    /// Extend another interface
    pub fn extends(mut self, parent: Arc<InterfaceDescriptor>) -> Self {
        self.parents.push(parent);
        self
    }

    /// Declare an abstract method
    pub fn abstract_method(mut self, name: &str, signature: Signature) -> Self {
        self.methods
            .push(MethodDescriptor::abstract_method(&self.name, name, signature));
        self
    }

    /// Declare a method with a built-in body
    pub fn default_method<F>(mut self, name: &str, signature: Signature, body: F) -> Self
    where
        F: Fn(&dyn Receiver, &[Value]) -> ProxyResult<Value> + Send + Sync + 'static,
    {
        self.methods
            .push(MethodDescriptor::default_method(&self.name, name, signature, body));
        self
    }

    /// Declare a prepared method.
    ///
    /// The declaring type is rewritten to this interface.
    pub fn method(mut self, method: MethodDescriptor) -> Self {
        let MethodDescriptor {
            key,
            visibility,
            body,
        } = method;
        self.methods.push(MethodDescriptor {
            key: MethodKey::new(&self.name, key.name(), key.signature.clone()),
            visibility,
            body,
        });
        self
    }

    /// Finish the description. A later declaration with the same name and
    /// signature replaces an earlier one.
    pub fn build(self) -> Arc<InterfaceDescriptor> {
        let mut methods: Vec<Arc<MethodDescriptor>> = Vec::with_capacity(self.methods.len());
        let mut method_indices: FxHashMap<String, Vec<usize>> = FxHashMap::default();

        for method in self.methods {
            let slots = method_indices.entry(method.name().to_string()).or_default();
            match slots
                .iter()
                .copied()
                .find(|&i| methods[i].signature() == method.signature())
            {
                Some(i) => methods[i] = Arc::new(method),
                None => {
                    slots.push(methods.len());
                    methods.push(Arc::new(method));
                }
            }
        }

        Arc::new(InterfaceDescriptor {
            name: Arc::from(self.name.as_str()),
            parents: self.parents,
            methods,
            method_indices,
        })
    }
}
