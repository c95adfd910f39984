//! Service descriptors and procedure signatures.
//!
//! A service is registered as a [`ServiceDescriptor`]: a bundle of
//! [`ProcedureSignature`]s, each a plain data record with a bound invoker.
//! How a descriptor is produced is the caller's business (handwritten,
//! code-generated from a schema, ..); the registry only consumes the
//! finished record. [`ServiceBuilder`] performs the registration-time
//! validation that must never be deferred to the wire.

use std::collections::HashSet;
use std::rc::Rc;

use crate::context::ContextSet;
use crate::error::RegistryError;
use crate::value::Value;

/// Identity of a class exposed through object references.
///
/// Class identity is global: a handle minted for a class owned by one
/// service may be passed to procedures of any other service, and it is this
/// id, not the service name, that is checked.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ClassId(Rc<str>);

impl ClassId {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Rc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ClassId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ClassId({})", self.0)
    }
}

impl std::fmt::Display for ClassId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An enumeration type: int32-backed with a closed value set.
#[derive(Clone, PartialEq, Eq)]
pub struct EnumDescriptor {
    name: Rc<str>,
    values: Rc<[i32]>,
}

impl EnumDescriptor {
    pub fn new(name: impl AsRef<str>, values: impl Into<Vec<i32>>) -> Self {
        Self {
            name: Rc::from(name.as_ref()),
            values: Rc::from(values.into()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contains(&self, value: i32) -> bool {
        self.values.contains(&value)
    }
}

impl std::fmt::Debug for EnumDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EnumDescriptor({})", self.name)
    }
}

/// The wire type of a parameter or return value.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDescriptor {
    Int32,
    Int64,
    UInt32,
    UInt64,
    Float,
    Double,
    Bool,
    String,
    Bytes,
    Enum(EnumDescriptor),
    /// An opaque protobuf message, identified by its fully qualified schema
    /// name.
    Message(Rc<str>),
    List(Box<TypeDescriptor>),
    Set(Box<TypeDescriptor>),
    Dictionary {
        key: Box<TypeDescriptor>,
        value: Box<TypeDescriptor>,
    },
    Tuple(Vec<TypeDescriptor>),
    Object(ClassId),
    Void,
}

impl TypeDescriptor {
    pub fn message(name: impl AsRef<str>) -> Self {
        TypeDescriptor::Message(Rc::from(name.as_ref()))
    }

    pub fn list(elem: TypeDescriptor) -> Self {
        TypeDescriptor::List(Box::new(elem))
    }

    pub fn set(elem: TypeDescriptor) -> Self {
        TypeDescriptor::Set(Box::new(elem))
    }

    pub fn dictionary(key: TypeDescriptor, value: TypeDescriptor) -> Self {
        TypeDescriptor::Dictionary {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, TypeDescriptor::Void)
    }

    pub fn is_object(&self) -> bool {
        matches!(self, TypeDescriptor::Object(_))
    }
}

impl std::fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeDescriptor::Int32 => f.write_str("int32"),
            TypeDescriptor::Int64 => f.write_str("int64"),
            TypeDescriptor::UInt32 => f.write_str("uint32"),
            TypeDescriptor::UInt64 => f.write_str("uint64"),
            TypeDescriptor::Float => f.write_str("float"),
            TypeDescriptor::Double => f.write_str("double"),
            TypeDescriptor::Bool => f.write_str("bool"),
            TypeDescriptor::String => f.write_str("string"),
            TypeDescriptor::Bytes => f.write_str("bytes"),
            TypeDescriptor::Enum(e) => write!(f, "Enum({})", e.name()),
            TypeDescriptor::Message(name) => write!(f, "Message({name})"),
            TypeDescriptor::List(elem) => write!(f, "List({elem})"),
            TypeDescriptor::Set(elem) => write!(f, "Set({elem})"),
            TypeDescriptor::Dictionary { key, value } => {
                write!(f, "Dictionary({key}, {value})")
            }
            TypeDescriptor::Tuple(elems) => {
                f.write_str("Tuple(")?;
                for (i, elem) in elems.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{elem}")?;
                }
                f.write_str(")")
            }
            TypeDescriptor::Object(class) => write!(f, "{class}"),
            TypeDescriptor::Void => f.write_str("void"),
        }
    }
}

/// One declared parameter of a procedure.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub ty: TypeDescriptor,
    /// Encoded literal default, captured at registration. Present iff the
    /// parameter is optional.
    pub default: Option<Vec<u8>>,
}

impl Parameter {
    pub fn is_optional(&self) -> bool {
        self.default.is_some()
    }
}

// ============================================================================
// Naming grammar
// ============================================================================

/// The kind a procedure name encodes.
///
/// Parsed once at registration; the dispatcher itself never re-inspects
/// names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcedureKind {
    /// A bare service-level procedure.
    Procedure,
    /// `get_<Prop>`
    PropertyGetter { property: String },
    /// `set_<Prop>`
    PropertySetter { property: String },
    /// `<Class>_<Method>`; the first parameter is the receiver handle.
    ClassMethod { class: String, method: String },
    /// `<Class>_get_<Prop>`
    ClassGetter { class: String, property: String },
    /// `<Class>_set_<Prop>`
    ClassSetter { class: String, property: String },
}

impl ProcedureKind {
    /// Parse a procedure name against the naming grammar.
    pub fn parse(name: &str) -> Result<Self, RegistryError> {
        let bad = || RegistryError::BadProcedureName(name.to_owned());

        if name.is_empty() {
            return Err(bad());
        }

        if let Some(property) = name.strip_prefix("get_") {
            if property.is_empty() {
                return Err(bad());
            }
            return Ok(ProcedureKind::PropertyGetter {
                property: property.to_owned(),
            });
        }
        if let Some(property) = name.strip_prefix("set_") {
            if property.is_empty() {
                return Err(bad());
            }
            return Ok(ProcedureKind::PropertySetter {
                property: property.to_owned(),
            });
        }

        match name.split_once('_') {
            None => Ok(ProcedureKind::Procedure),
            Some((class, rest)) => {
                if class.is_empty() || rest.is_empty() {
                    return Err(bad());
                }
                if let Some(property) = rest.strip_prefix("get_") {
                    if property.is_empty() {
                        return Err(bad());
                    }
                    Ok(ProcedureKind::ClassGetter {
                        class: class.to_owned(),
                        property: property.to_owned(),
                    })
                } else if let Some(property) = rest.strip_prefix("set_") {
                    if property.is_empty() {
                        return Err(bad());
                    }
                    Ok(ProcedureKind::ClassSetter {
                        class: class.to_owned(),
                        property: property.to_owned(),
                    })
                } else {
                    Ok(ProcedureKind::ClassMethod {
                        class: class.to_owned(),
                        method: rest.to_owned(),
                    })
                }
            }
        }
    }

    /// Whether the first parameter is implicitly the receiver handle.
    pub fn is_class_bound(&self) -> bool {
        matches!(
            self,
            ProcedureKind::ClassMethod { .. }
                | ProcedureKind::ClassGetter { .. }
                | ProcedureKind::ClassSetter { .. }
        )
    }
}

// ============================================================================
// Invokers and continuations
// ============================================================================

/// Result type returned by invokers and continuations.
///
/// `Err` carries an application failure; the dispatcher reports it as a
/// `ProcedureFailed` response.
pub type InvokeResult = Result<Invocation, Box<dyn std::error::Error>>;

/// The bound callable behind a procedure. Receives the fully materialized
/// argument vector, receiver first for class-bound procedures.
pub type Invoker = Box<dyn Fn(Vec<Value>) -> InvokeResult>;

/// What one invocation step produced.
pub enum Invocation {
    /// Finished. `None` is a null (or void) result.
    Complete(Option<Value>),
    /// Not finished: run the carried continuation on a later tick.
    Yield(Continuation),
}

impl Invocation {
    /// Finish with a value.
    pub fn returning(value: impl Into<Value>) -> InvokeResult {
        Ok(Invocation::Complete(Some(value.into())))
    }

    /// Finish with no value (void procedures, null object returns).
    pub fn void() -> InvokeResult {
        Ok(Invocation::Complete(None))
    }

    /// Suspend; `step` runs on the next tick.
    pub fn yielding(step: impl FnOnce() -> InvokeResult + 'static) -> InvokeResult {
        Ok(Invocation::Yield(Continuation::new(step)))
    }
}

impl std::fmt::Debug for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Invocation::Complete(v) => f.debug_tuple("Complete").field(v).finish(),
            Invocation::Yield(_) => f.write_str("Yield(..)"),
        }
    }
}

/// One suspended step of a call.
///
/// Running a continuation consumes it; a yielding run hands back its
/// replacement.
pub struct Continuation {
    step: Box<dyn FnOnce() -> InvokeResult>,
}

impl Continuation {
    pub fn new(step: impl FnOnce() -> InvokeResult + 'static) -> Self {
        Self {
            step: Box::new(step),
        }
    }

    pub fn run(self) -> InvokeResult {
        (self.step)()
    }
}

impl std::fmt::Debug for Continuation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Continuation(..)")
    }
}

// ============================================================================
// Signatures and descriptors
// ============================================================================

/// Immutable description of one registered procedure.
pub struct ProcedureSignature {
    service: String,
    name: String,
    kind: ProcedureKind,
    parameters: Vec<Parameter>,
    return_type: TypeDescriptor,
    required_context: ContextSet,
    invoker: Invoker,
}

impl ProcedureSignature {
    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fully_qualified_name(&self) -> String {
        format!("{}.{}", self.service, self.name)
    }

    pub fn kind(&self) -> &ProcedureKind {
        &self.kind
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn return_type(&self) -> &TypeDescriptor {
        &self.return_type
    }

    pub fn required_context(&self) -> &ContextSet {
        &self.required_context
    }

    /// Run the bound invoker with a materialized argument vector.
    pub fn invoke(&self, arguments: Vec<Value>) -> InvokeResult {
        (self.invoker)(arguments)
    }
}

impl std::fmt::Debug for ProcedureSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcedureSignature")
            .field("name", &self.fully_qualified_name())
            .field("kind", &self.kind)
            .field("parameters", &self.parameters.len())
            .field("return_type", &self.return_type)
            .finish_non_exhaustive()
    }
}

/// Everything one service contributes to the registry.
#[derive(Debug)]
pub struct ServiceDescriptor {
    pub(crate) name: String,
    pub(crate) procedures: Vec<ProcedureSignature>,
    pub(crate) classes: Vec<ClassId>,
}

impl ServiceDescriptor {
    /// Start building a descriptor for the named service.
    pub fn builder(name: impl Into<String>) -> ServiceBuilder {
        ServiceBuilder {
            name: name.into(),
            classes: Vec::new(),
            procedures: Vec::new(),
            seen: HashSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Definition of one procedure, fed to [`ServiceBuilder::procedure`].
pub struct ProcedureDef {
    name: String,
    parameters: Vec<Parameter>,
    return_type: TypeDescriptor,
    required_context: ContextSet,
    invoker: Invoker,
}

impl ProcedureDef {
    /// A procedure with no parameters, a void return and no context
    /// restriction. Shape it with the `with_*` methods.
    pub fn new(name: impl Into<String>, invoker: impl Fn(Vec<Value>) -> InvokeResult + 'static) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            return_type: TypeDescriptor::Void,
            required_context: ContextSet::Any,
            invoker: Box::new(invoker),
        }
    }

    /// Append a required parameter.
    pub fn parameter(mut self, name: impl Into<String>, ty: TypeDescriptor) -> Self {
        self.parameters.push(Parameter {
            name: name.into(),
            ty,
            default: None,
        });
        self
    }

    /// Append an optional parameter with an encoded literal default.
    ///
    /// The bytes are captured as-is and decoded whenever the caller omits
    /// the argument; they are never re-evaluated.
    pub fn optional_parameter(
        mut self,
        name: impl Into<String>,
        ty: TypeDescriptor,
        default: Vec<u8>,
    ) -> Self {
        self.parameters.push(Parameter {
            name: name.into(),
            ty,
            default: Some(default),
        });
        self
    }

    /// Declare the return type.
    pub fn returns(mut self, ty: TypeDescriptor) -> Self {
        self.return_type = ty;
        self
    }

    /// Restrict the contexts this procedure may run in.
    pub fn available_in(mut self, contexts: ContextSet) -> Self {
        self.required_context = contexts;
        self
    }
}

/// Builder for a [`ServiceDescriptor`], validating as it goes.
#[derive(Debug)]
pub struct ServiceBuilder {
    name: String,
    classes: Vec<ClassId>,
    procedures: Vec<ProcedureSignature>,
    seen: HashSet<String>,
}

impl ServiceBuilder {
    /// Declare a class owned by this service.
    pub fn class(&mut self, class: ClassId) -> &mut Self {
        if !self.classes.contains(&class) {
            self.classes.push(class);
        }
        self
    }

    /// Add a procedure.
    ///
    /// Fails if the name violates the grammar, repeats within the service,
    /// places a required parameter after an optional one, or is class-bound
    /// without an object receiver in first position.
    pub fn procedure(&mut self, def: ProcedureDef) -> Result<&mut Self, RegistryError> {
        let kind = ProcedureKind::parse(&def.name)?;
        let qualified = format!("{}.{}", self.name, def.name);

        if !self.seen.insert(def.name.clone()) {
            return Err(RegistryError::DuplicateProcedure(qualified));
        }

        let mut optional_seen = false;
        for param in &def.parameters {
            if param.is_optional() {
                optional_seen = true;
            } else if optional_seen {
                return Err(RegistryError::RequiredAfterOptional {
                    procedure: qualified,
                    parameter: param.name.clone(),
                });
            }
        }

        if kind.is_class_bound() {
            match def.parameters.first() {
                Some(receiver) if receiver.ty.is_object() => {}
                _ => return Err(RegistryError::MissingReceiver(qualified)),
            }
        }

        self.procedures.push(ProcedureSignature {
            service: self.name.clone(),
            name: def.name,
            kind,
            parameters: def.parameters,
            return_type: def.return_type,
            required_context: def.required_context,
            invoker: def.invoker,
        });
        Ok(self)
    }

    /// Finish the descriptor.
    pub fn build(self) -> Result<ServiceDescriptor, RegistryError> {
        if self.name.is_empty() {
            return Err(RegistryError::EmptyServiceName);
        }
        Ok(ServiceDescriptor {
            name: self.name,
            procedures: self.procedures,
            classes: self.classes,
        })
    }
}
