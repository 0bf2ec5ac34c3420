use std::io::stderr;

use termion::{is_tty, style};

/// Compilation is aborted by returning one of these. Everything else is reported through a
/// [ParseEvents] and compilation carries on.
#[derive(Clone, Debug, PartialEq)]
pub enum CompileError {
    /// An unrecoverable error has already been reported: stop compiling.
    Unrecoverable,
    /// The compiler itself has gone wrong.
    Internal(String),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
    /// An error after which compilation stops.
    Fatal,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ErrorKind {
    /// A class was used as the parent of a class or the type of a member, but is abstract.
    AbstractClass,
    /// A value was given for the same case in a `Switch` twice.
    AlreadyDefCase,
    /// A call matched more than one constructor equally well.
    AmbiguousOverload,
    /// A partial class name matched more than one class.
    AmbiguousClass(String),
    /// An assignment's right hand side isn't of a compatible type.
    BadAssign,
    /// A `TypeCast` to a class that can't be cast to.
    BadCastType,
    /// Not one of the three legal forms of char literal.
    BadCharLiteral,
    /// An item's value wasn't a legal enum value.
    BadEnumValue,
    /// A literal's value couldn't be converted to the literal's type.
    BadLiteralInit(String),
    /// A name that doesn't resolve to anything in scope.
    BadNameRef(String),
    /// A name contains a character that isn't allowed in names.
    BadNameChar(String),
    /// Not a valid numeric literal.
    BadNumLiteral(String),
    /// An operator used on the wrong side of an expression.
    BadOpHere,
    /// A method call with the wrong number of parameters.
    BadParmCount(String),
    /// An override of a parent method whose signature doesn't match.
    BadOverride(String),
    /// A class path contains a character that isn't allowed in class paths.
    BadClassPathChar(String),
    /// A `Switch` on a type that can't be switched on.
    BadSwitchType,
    /// A cast between types that can't be cast between.
    CannotCast,
    /// A case value couldn't be converted to the switch's type.
    CantConvertLiteral,
    /// A `DynTypeRef` that couldn't be resolved to a class path.
    CantResolvePath(String),
    /// A case value was not a literal.
    CaseMustBeLiteral,
    /// A case value already used in this `Switch`.
    CaseIsUsed(String),
    /// A class importing itself, directly or indirectly.
    CircularImport(String),
    /// The loaded class's path doesn't match the path it was loaded as.
    ClassPathMatch { expected: String, found: String },
    /// A class used, but neither imported nor intrinsic.
    ClassNotImported(String),
    /// A class which can't be found.
    ClassNotFound(String),
    /// An `#EndDebug` with no matching `#BeginDebug`.
    CondUnderflow,
    /// Constructors can't have attributes.
    CtorAttrs,
    /// Constructors can't have a return type.
    CtorCantReturn,
    /// Constructors can't have `Out` or `InOut` parameters.
    CtorOutParm,
    /// A class path which is already in use.
    DupClassName(String),
    /// A directive given more than once.
    DupDirective(String),
    /// An enum item given more than once.
    DupEnumItem(String),
    /// A method declared more than once.
    DupMethod(String),
    /// A name already used by a member, method, or literal.
    DupName(String),
    /// A parameter name used more than once, or clashing with another name.
    DupParmName(String),
    /// An empty class path part (e.g. `MEng..Foo`).
    EmptyPathPart,
    /// An enum with no items.
    EmptyEnum,
    /// `DynTypeRef("$DynTypeRef")` was used but no special dynamic reference was configured.
    EmptySpecDynRef,
    /// End of file inside a `#BeginDebug` block.
    EofInConditional,
    /// A boolean expression was needed.
    ExpectedBoolExpr,
    /// `Case`, `FTCase`, or `Default` were expected.
    ExpectedCase,
    /// Another case or `EndSwitch` was expected.
    ExpectedCaseOrEnd,
    /// A class attribute was expected.
    ExpectedClassAttr,
    /// A class path was expected.
    ExpectedClassPath,
    /// `name = "value";` was expected.
    ExpectedDirective,
    /// A name was expected after a `.`.
    ExpectedDotName,
    /// The end of a flow control statement doesn't match the innermost open statement.
    ExpectedEndFlow {
        open: &'static str,
        line: u32,
        seen: &'static str,
    },
    /// `EndConstructor` was expected.
    ExpectedEndCtor,
    /// `EndMethod` was expected.
    ExpectedEndMethod,
    /// An object of an enum type was needed.
    ExpectedEnumObj,
    /// An enum literal was expected.
    ExpectedEnumLit,
    /// A quoted string was expected.
    ExpectedLitStr,
    /// A local attribute was expected.
    ExpectedLocalAttr,
    /// A member attribute was expected.
    ExpectedMembAttr,
    /// A method attribute was expected.
    ExpectedMethAttr,
    /// `Method` or `Constructor` was expected.
    ExpectedMethodCtor,
    /// A name was expected.
    ExpectedName,
    /// `Enum=`, `VectorOf`, or `ArrayOf` was expected.
    ExpectedNestedType,
    /// A parameter attribute was expected.
    ExpectedParmAttr,
    /// A method with a return value doesn't end with a `Return`.
    ExpectedReturn,
    /// A statement was expected.
    ExpectedStatement,
    /// A specific token was expected.
    ExpectedToken(&'static str),
    /// The expressions on each side of an operator aren't of compatible types.
    ExprSidesMatch,
    /// A class path's first character isn't legal.
    FirstNameChar(String),
    /// A method signature with no implementation.
    InfoWithoutImpl(String),
    /// An implementation whose id doesn't match its signature.
    ImplInfoIdMatch(String),
    /// Initializers given out of member declaration order.
    InitOrder(String),
    /// An `Out` or `InOut` parameter passed something other than a non-const object reference.
    InParmOnly,
    /// The compiler itself went wrong.
    Internal(String),
    /// The sides of a logical operator aren't boolean.
    LogOpExprs,
    /// A non-const method called through a const reference.
    MemberIsConst,
    /// A member initializer for a member that doesn't exist.
    MemberNotFound(String),
    /// A const method calling a non-const method of this object.
    MethodIsConst,
    /// A method which doesn't exist.
    MethodNotFound(String),
    /// An operand which needs to be an object reference.
    MustBeObjRef,
    /// An expression with no value used where a value was needed.
    MustReturnValue,
    /// A non-const operator on a const object.
    NCOpOnConstObj,
    /// A raw newline inside a quoted string.
    NewLineInStr,
    /// A case with no value.
    NoCaseValue,
    /// No constructor matches the parameters given.
    NoCtorMatch,
    /// A class with no constructors.
    NoCtors,
    /// A class with no default constructor used where one is needed.
    NoDefCtor(String),
    /// A constructor initializer list with nothing in it.
    NoInitializers,
    /// No parent constructor matches the parameters given.
    NoParentCtorMatch,
    /// An object which isn't of a class that can be indexed.
    NotIndexableObj,
    /// An assignment of a class which can't be copied.
    NotCopyable,
    /// A statement which can't appear on the left hand side.
    NotOnLHS,
    /// A returned value of the wrong class.
    NotRetClass,
    /// A case value of a type that can't be switched on.
    NotSwitchType,
    /// A numeric literal out of range for its type.
    NumRangeErr(String),
    /// An index which isn't a `Card4` or enum.
    NumericIndexType,
    /// `$Exception` or `Rethrow` outside of a catch block.
    OnlyInCatch,
    /// A flow control statement still open at the end of a method.
    OpenFlowStatement { kind: &'static str, line: u32 },
    /// An operator which the class doesn't support.
    OpNotSupported(String),
    /// A parameter of the wrong type.
    ParmType(usize),
    /// The parent class's compilation failed.
    ParentFailed(String),
    /// An override of a `Final` parent method.
    ParentMethodIsFinal(String),
    /// An `Overrides` method with no parent counterpart.
    ParentMethNotFound(String),
    /// A class derived from a `Final` class.
    ParentClassIsFinal(String),
    /// An inherited `Required` method which wasn't overridden.
    ReqMethodNotOver(String),
    /// A switch which lacks cases or a default.
    RequiredCases,
    /// An override which isn't in an `Overrides` block.
    RequiresOverride(String),
    /// A keyword used as a name.
    ReservedWord(String),
    /// Too many format tokens in a `Throw`.
    TooManyThrowTokens,
    /// A `Throw` of something which isn't an enum.
    ThrowType,
    /// A format token in a `Throw` which isn't formattable.
    ThrowFmtType,
    /// A class path with a trailing period.
    TrailPathPart,
    /// A `Break` outside any loop.
    UnexpectedBreak,
    /// The end of a flow control statement with no open statement.
    UnexpectedEndFlow(&'static str),
    /// End of file where more input was needed.
    UnexpectedEof,
    /// A token which can't appear here.
    UnexpectedToken(String),
    /// End of file inside a quoted string.
    UnterminatedStr,
}

impl ErrorKind {
    pub fn to_string(&self) -> String {
        match self {
            ErrorKind::AbstractClass => "Abstract classes cannot be instantiated".to_owned(),
            ErrorKind::AlreadyDefCase => "This case value has already been defined".to_owned(),
            ErrorKind::AmbiguousOverload => {
                "The parameters match more than one constructor".to_owned()
            }
            ErrorKind::AmbiguousClass(n) => format!("Class name '{}' is ambiguous", n),
            ErrorKind::BadAssign => "The value can't be assigned to the target".to_owned(),
            ErrorKind::BadCastType => {
                "Only numeric, Boolean and enum types can be cast".to_owned()
            }
            ErrorKind::BadCharLiteral => "Invalid character literal".to_owned(),
            ErrorKind::BadEnumValue => "Invalid enum value".to_owned(),
            ErrorKind::BadLiteralInit(n) => {
                format!("The value of literal '{}' is not valid for its type", n)
            }
            ErrorKind::BadNameRef(n) => format!("'{}' is not a known name", n),
            ErrorKind::BadNameChar(n) => format!("'{}' contains illegal name characters", n),
            ErrorKind::BadNumLiteral(t) => format!("'{}' is not a valid numeric literal", t),
            ErrorKind::BadOpHere => "That operator is not legal here".to_owned(),
            ErrorKind::BadParmCount(n) => {
                format!("Wrong number of parameters in call to '{}'", n)
            }
            ErrorKind::BadOverride(n) => {
                format!("Method '{}' does not match the signature it overrides", n)
            }
            ErrorKind::BadClassPathChar(p) => {
                format!("Class path '{}' contains illegal characters", p)
            }
            ErrorKind::BadSwitchType => {
                "Switch values must be cardinal, integral, char or enum".to_owned()
            }
            ErrorKind::CannotCast => "That cast is not supported".to_owned(),
            ErrorKind::CantConvertLiteral => {
                "The case value can't be converted to the switch type".to_owned()
            }
            ErrorKind::CantResolvePath(p) => format!("Can't resolve type reference '{}'", p),
            ErrorKind::CaseMustBeLiteral => "Case values must be literals".to_owned(),
            ErrorKind::CaseIsUsed(v) => format!("Case value {} is already used", v),
            ErrorKind::CircularImport(p) => format!("Class '{}' is imported circularly", p),
            ErrorKind::ClassPathMatch { expected, found } => format!(
                "Expected class path '{}' but the class declares '{}'",
                expected, found
            ),
            ErrorKind::ClassNotImported(p) => format!("Class '{}' has not been imported", p),
            ErrorKind::ClassNotFound(p) => format!("Class '{}' not found", p),
            ErrorKind::CondUnderflow => "#EndDebug without a matching #BeginDebug".to_owned(),
            ErrorKind::CtorAttrs => "Constructors cannot have attributes".to_owned(),
            ErrorKind::CtorCantReturn => "Constructors cannot return a value".to_owned(),
            ErrorKind::CtorOutParm => {
                "Constructors cannot have Out or InOut parameters".to_owned()
            }
            ErrorKind::DupClassName(p) => format!("Class '{}' already exists", p),
            ErrorKind::DupDirective(n) => format!("Directive '{}' is already defined", n),
            ErrorKind::DupEnumItem(n) => format!("Enum item '{}' is already defined", n),
            ErrorKind::DupMethod(n) => format!("Method '{}' is already defined", n),
            ErrorKind::DupName(n) => format!("Name '{}' is already in use", n),
            ErrorKind::DupParmName(n) => format!("Parameter name '{}' is already in use", n),
            ErrorKind::EmptyPathPart => "Class path contains an empty part".to_owned(),
            ErrorKind::EmptyEnum => "Enums must have at least one item".to_owned(),
            ErrorKind::EmptySpecDynRef => "No dynamic type reference is set".to_owned(),
            ErrorKind::EofInConditional => "End of file inside a #BeginDebug block".to_owned(),
            ErrorKind::ExpectedBoolExpr => "Expected a Boolean expression".to_owned(),
            ErrorKind::ExpectedCase => "Expected Case, FTCase or Default".to_owned(),
            ErrorKind::ExpectedCaseOrEnd => "Expected another case or EndSwitch".to_owned(),
            ErrorKind::ExpectedClassAttr => "Expected a class attribute".to_owned(),
            ErrorKind::ExpectedClassPath => "Expected a class path".to_owned(),
            ErrorKind::ExpectedDirective => "Expected name = \"value\";".to_owned(),
            ErrorKind::ExpectedDotName => "Expected a name after the period".to_owned(),
            ErrorKind::ExpectedEndFlow { open, line, seen } => format!(
                "{} does not match the {} opened at line {}",
                seen, open, line
            ),
            ErrorKind::ExpectedEndCtor => "Expected EndConstructor".to_owned(),
            ErrorKind::ExpectedEndMethod => "Expected EndMethod".to_owned(),
            ErrorKind::ExpectedEnumObj => "Expected an enum object".to_owned(),
            ErrorKind::ExpectedEnumLit => "Expected an enum value".to_owned(),
            ErrorKind::ExpectedLitStr => "Expected a quoted string".to_owned(),
            ErrorKind::ExpectedLocalAttr => "Expected Const or NonConst".to_owned(),
            ErrorKind::ExpectedMembAttr => "Expected Const or NonConst".to_owned(),
            ErrorKind::ExpectedMethAttr => "Expected a method attribute".to_owned(),
            ErrorKind::ExpectedMethodCtor => "Expected Method or Constructor".to_owned(),
            ErrorKind::ExpectedName => "Expected a name".to_owned(),
            ErrorKind::ExpectedNestedType => "Expected Enum=, VectorOf or ArrayOf".to_owned(),
            ErrorKind::ExpectedParmAttr => "Expected In, Out or InOut".to_owned(),
            ErrorKind::ExpectedReturn => "Method must end with a Return".to_owned(),
            ErrorKind::ExpectedStatement => "Expected a statement".to_owned(),
            ErrorKind::ExpectedToken(t) => format!("Expected {}", t),
            ErrorKind::ExprSidesMatch => {
                "The two sides of the expression are not compatible".to_owned()
            }
            ErrorKind::FirstNameChar(n) => format!("'{}' must start with a letter", n),
            ErrorKind::InfoWithoutImpl(n) => format!("Method '{}' has no implementation", n),
            ErrorKind::ImplInfoIdMatch(n) => {
                format!("The implementation of '{}' has the wrong id", n)
            }
            ErrorKind::InitOrder(n) => {
                format!("Member '{}' is initialised out of declaration order", n)
            }
            ErrorKind::InParmOnly => {
                "Only In parameters can be passed a temporary or const value".to_owned()
            }
            ErrorKind::Internal(s) => format!("Internal error: {}", s),
            ErrorKind::LogOpExprs => "Logical operators need Boolean operands".to_owned(),
            ErrorKind::MemberIsConst => {
                "A non-const method can't be called through a const reference".to_owned()
            }
            ErrorKind::MemberNotFound(n) => format!("'{}' is not a member of this class", n),
            ErrorKind::MethodIsConst => {
                "A const method can't call a non-const method of its own object".to_owned()
            }
            ErrorKind::MethodNotFound(n) => format!("Method '{}' not found", n),
            ErrorKind::MustBeObjRef => "Expected an object reference".to_owned(),
            ErrorKind::MustReturnValue => "The expression has no value".to_owned(),
            ErrorKind::NCOpOnConstObj => "Non-const operation on a const object".to_owned(),
            ErrorKind::NewLineInStr => "New line inside a quoted string".to_owned(),
            ErrorKind::NoCaseValue => "Case has no value".to_owned(),
            ErrorKind::NoCtorMatch => "No constructor matches these parameters".to_owned(),
            ErrorKind::NoCtors => "The class has no constructors".to_owned(),
            ErrorKind::NoDefCtor(p) => format!("Class '{}' has no default constructor", p),
            ErrorKind::NoInitializers => "Expected at least one initializer".to_owned(),
            ErrorKind::NoParentCtorMatch => {
                "No parent constructor matches these parameters".to_owned()
            }
            ErrorKind::NotIndexableObj => "The object can't be indexed".to_owned(),
            ErrorKind::NotCopyable => "Objects of this class can't be copied".to_owned(),
            ErrorKind::NotOnLHS => "Not legal on the left hand side".to_owned(),
            ErrorKind::NotRetClass => "The value is not of the method's return type".to_owned(),
            ErrorKind::NotSwitchType => "The case value is not of the switch's type".to_owned(),
            ErrorKind::NumRangeErr(t) => format!("'{}' is out of range for its type", t),
            ErrorKind::NumericIndexType => "Indexes must be Card4 or enum values".to_owned(),
            ErrorKind::OnlyInCatch => "Only legal inside a Catch block".to_owned(),
            ErrorKind::OpenFlowStatement { kind, line } => {
                format!("The {} at line {} was never closed", kind, line)
            }
            ErrorKind::OpNotSupported(op) => {
                format!("The class doesn't support the {} operation", op)
            }
            ErrorKind::ParmType(n) => format!("Parameter {} is of the wrong type", n),
            ErrorKind::ParentFailed(p) => format!("Parent class '{}' failed to compile", p),
            ErrorKind::ParentMethodIsFinal(n) => {
                format!("Parent method '{}' is final and can't be overridden", n)
            }
            ErrorKind::ParentMethNotFound(n) => {
                format!("'{}' overrides nothing in the parent class", n)
            }
            ErrorKind::ParentClassIsFinal(p) => {
                format!("Class '{}' is final and can't be derived from", p)
            }
            ErrorKind::ReqMethodNotOver(n) => {
                format!("Required method '{}' was not overridden", n)
            }
            ErrorKind::RequiredCases => "Switch must have cases and a Default".to_owned(),
            ErrorKind::RequiresOverride(n) => {
                format!("'{}' overrides a parent method and must be in an Overrides block", n)
            }
            ErrorKind::ReservedWord(n) => format!("'{}' is a reserved word", n),
            ErrorKind::TooManyThrowTokens => "At most 8 format tokens can be thrown".to_owned(),
            ErrorKind::ThrowType => "Only enum values can be thrown".to_owned(),
            ErrorKind::ThrowFmtType => "Thrown format tokens must be formattable".to_owned(),
            ErrorKind::TrailPathPart => "Class path has a trailing period".to_owned(),
            ErrorKind::UnexpectedBreak => "Break is only legal inside a loop".to_owned(),
            ErrorKind::UnexpectedEndFlow(seen) => format!("Unexpected {}", seen),
            ErrorKind::UnexpectedEof => "Unexpected end of file".to_owned(),
            ErrorKind::UnexpectedToken(t) => format!("Unexpected '{}'", t),
            ErrorKind::UnterminatedStr => "Unterminated quoted string".to_owned(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: ErrorKind,
    pub line: u32,
    pub col: u32,
    pub class_path: String,
}

impl Diagnostic {
    pub fn message(&self) -> String {
        self.kind.to_string()
    }

    pub fn console_print(&self) {
        let sev = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal error",
        };
        if is_tty(&stderr()) {
            eprintln!(
                "{}, line {}, column {}: {}{}{}: {}",
                self.class_path,
                self.line,
                self.col,
                style::Bold,
                sev,
                style::Reset,
                self.message()
            );
        } else {
            eprintln!(
                "{}, line {}, column {}: {}: {}",
                self.class_path,
                self.line,
                self.col,
                sev,
                self.message()
            );
        }
    }
}

/// The receiver of everything the compiler reports.
pub trait ParseEvents {
    fn parse_event(&mut self, diag: Diagnostic);
    /// Compilation of `class_path` was aborted.
    fn parse_exception(&mut self, class_path: &str, err: &CompileError);
}

/// Store every diagnostic.
#[derive(Debug, Default)]
pub struct CollectingEvents {
    pub diagnostics: Vec<Diagnostic>,
    pub aborted: Vec<(String, CompileError)>,
}

impl CollectingEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity != Severity::Warning)
    }

    /// Does any diagnostic satisfy `f`?
    pub fn any(&self, f: impl Fn(&ErrorKind) -> bool) -> bool {
        self.diagnostics.iter().any(|d| f(&d.kind))
    }
}

impl ParseEvents for CollectingEvents {
    fn parse_event(&mut self, diag: Diagnostic) {
        self.diagnostics.push(diag);
    }

    fn parse_exception(&mut self, class_path: &str, err: &CompileError) {
        self.aborted.push((class_path.to_owned(), err.clone()));
    }
}
