use std::collections::HashMap;

/// Descriptor of `java/lang/invoke/LambdaMetafactory.metafactory`.
pub const LAMBDA_METAFACTORY_DESC: &str = "(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;Ljava/lang/invoke/MethodType;Ljava/lang/invoke/MethodType;Ljava/lang/invoke/MethodHandle;Ljava/lang/invoke/MethodType;)Ljava/lang/invoke/CallSite;";

const ACC_PUBLIC: u16 = 0x0001;
const ACC_SUPER: u16 = 0x0020;
const ACC_INTERFACE: u16 = 0x0200;
const ACC_ABSTRACT: u16 = 0x0400;

#[derive(Default)]
struct PoolBuilder {
    entries: Vec<Vec<u8>>,
    interned: HashMap<Vec<u8>, u16>,
    slots: u16,
}

impl PoolBuilder {
    fn intern(&mut self, entry: Vec<u8>) -> u16 {
        if let Some(&index) = self.interned.get(&entry) {
            return index;
        }
        let index = self.slots + 1;
        self.slots += 1;
        self.interned.insert(entry.clone(), index);
        self.entries.push(entry);
        index
    }

    fn utf8(&mut self, value: &str) -> u16 {
        let mut entry = vec![1];
        entry.extend_from_slice(&(value.len() as u16).to_be_bytes());
        entry.extend_from_slice(value.as_bytes());
        self.intern(entry)
    }

    fn indexed(&mut self, tag: u8, indices: &[u16]) -> u16 {
        let mut entry = vec![tag];
        for index in indices {
            entry.extend_from_slice(&index.to_be_bytes());
        }
        self.intern(entry)
    }

    fn class(&mut self, name: &str) -> u16 {
        let name = self.utf8(name);
        self.indexed(7, &[name])
    }

    fn string(&mut self, value: &str) -> u16 {
        let value = self.utf8(value);
        self.indexed(8, &[value])
    }

    fn integer(&mut self, value: i32) -> u16 {
        let mut entry = vec![3];
        entry.extend_from_slice(&value.to_be_bytes());
        self.intern(entry)
    }

    fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name = self.utf8(name);
        let descriptor = self.utf8(descriptor);
        self.indexed(12, &[name, descriptor])
    }

    fn member_ref(&mut self, tag: u8, owner: &str, name: &str, descriptor: &str) -> u16 {
        let class = self.class(owner);
        let nat = self.name_and_type(name, descriptor);
        self.indexed(tag, &[class, nat])
    }

    fn method_ref(&mut self, owner: &str, name: &str, descriptor: &str, is_interface: bool) -> u16 {
        let tag = if is_interface { 11 } else { 10 };
        self.member_ref(tag, owner, name, descriptor)
    }

    fn method_handle(
        &mut self,
        kind: u8,
        owner: &str,
        name: &str,
        descriptor: &str,
        is_interface: bool,
    ) -> u16 {
        let reference = if kind <= 4 {
            self.member_ref(9, owner, name, descriptor)
        } else {
            self.method_ref(owner, name, descriptor, is_interface)
        };
        let mut entry = vec![15, kind];
        entry.extend_from_slice(&reference.to_be_bytes());
        self.intern(entry)
    }

    fn method_type(&mut self, descriptor: &str) -> u16 {
        let descriptor = self.utf8(descriptor);
        self.indexed(16, &[descriptor])
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(self.slots + 1).to_be_bytes());
        for entry in &self.entries {
            out.extend_from_slice(entry);
        }
    }
}

/// Static argument of a hand-written `invokedynamic` site.
#[derive(Debug, Clone)]
pub enum BootstrapArg {
    Handle {
        kind: u8,
        owner: String,
        name: String,
        descriptor: String,
        is_interface: bool,
    },
    MethodType(String),
    String(String),
    Integer(i32),
}

struct MemberSpec {
    access: u16,
    name: String,
    descriptor: String,
    code: Option<Vec<u8>>,
}

/// Assembles minimal (version 52) class files.
///
/// Method bodies are written with [`CodeBuilder`]; stack map frames, exception
/// tables and debug attributes are never emitted.
pub struct ClassFileBuilder {
    pool: PoolBuilder,
    bootstrap_methods: Vec<(u16, Vec<u16>)>,
    access: u16,
    name: String,
    super_class: Option<String>,
    interfaces: Vec<String>,
    fields: Vec<MemberSpec>,
    methods: Vec<MemberSpec>,
}

impl ClassFileBuilder {
    /// A public class extending `java/lang/Object`.
    pub fn new(name: &str) -> Self {
        Self {
            pool: PoolBuilder::default(),
            bootstrap_methods: Vec::new(),
            access: ACC_PUBLIC | ACC_SUPER,
            name: name.to_string(),
            super_class: Some("java/lang/Object".to_string()),
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// A public interface.
    pub fn interface(name: &str) -> Self {
        Self::new(name).access(ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT)
    }

    pub fn access(mut self, access: u16) -> Self {
        self.access = access;
        self
    }

    pub fn extends(mut self, super_class: &str) -> Self {
        self.super_class = Some(super_class.to_string());
        self
    }

    /// Only `java/lang/Object` has no superclass.
    pub fn no_super(mut self) -> Self {
        self.super_class = None;
        self
    }

    pub fn implements(mut self, interface: &str) -> Self {
        self.interfaces.push(interface.to_string());
        self
    }

    pub fn field(mut self, access: u16, name: &str, descriptor: &str) -> Self {
        self.fields.push(MemberSpec {
            access,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            code: None,
        });
        self
    }

    /// Adds a method whose body is produced by `body`. A trailing `return` is
    /// appended when the body does not end in one.
    pub fn method(
        mut self,
        access: u16,
        name: &str,
        descriptor: &str,
        body: impl FnOnce(&mut CodeBuilder<'_>),
    ) -> Self {
        let mut code = CodeBuilder {
            pool: &mut self.pool,
            bootstrap_methods: &mut self.bootstrap_methods,
            code: Vec::new(),
        };
        body(&mut code);
        let mut code = code.code;
        if !matches!(code.last(), Some(0xac..=0xb1) | Some(0xbf)) {
            code.push(0xb1);
        }
        self.methods.push(MemberSpec {
            access,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            code: Some(code),
        });
        self
    }

    /// Adds a method without a `Code` attribute.
    pub fn abstract_method(mut self, access: u16, name: &str, descriptor: &str) -> Self {
        self.methods.push(MemberSpec {
            access: access | ACC_ABSTRACT,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            code: None,
        });
        self
    }

    /// Adds a method whose bytecode array is taken verbatim, e.g. to produce a
    /// body that fails to decode.
    pub fn method_with_raw_code(
        mut self,
        access: u16,
        name: &str,
        descriptor: &str,
        code: Vec<u8>,
    ) -> Self {
        self.methods.push(MemberSpec {
            access,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            code: Some(code),
        });
        self
    }

    pub fn build(mut self) -> Vec<u8> {
        let this_class = self.pool.class(&self.name);
        let super_class = match &self.super_class {
            Some(name) => self.pool.class(name),
            None => 0,
        };
        let interfaces: Vec<u16> = self
            .interfaces
            .iter()
            .map(|name| self.pool.class(name))
            .collect();
        let fields = encode_members(&mut self.pool, &self.fields);
        let methods = encode_members(&mut self.pool, &self.methods);
        let bootstrap_attr = (!self.bootstrap_methods.is_empty())
            .then(|| self.pool.utf8("BootstrapMethods"));

        let mut out = Vec::new();
        out.extend_from_slice(&0xCAFEBABEu32.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&52u16.to_be_bytes());
        self.pool.write(&mut out);
        out.extend_from_slice(&self.access.to_be_bytes());
        out.extend_from_slice(&this_class.to_be_bytes());
        out.extend_from_slice(&super_class.to_be_bytes());
        out.extend_from_slice(&(interfaces.len() as u16).to_be_bytes());
        for index in interfaces {
            out.extend_from_slice(&index.to_be_bytes());
        }
        out.extend_from_slice(&fields);
        out.extend_from_slice(&methods);

        match bootstrap_attr {
            Some(name) => {
                let mut body = Vec::new();
                body.extend_from_slice(&(self.bootstrap_methods.len() as u16).to_be_bytes());
                for (handle, args) in &self.bootstrap_methods {
                    body.extend_from_slice(&handle.to_be_bytes());
                    body.extend_from_slice(&(args.len() as u16).to_be_bytes());
                    for arg in args {
                        body.extend_from_slice(&arg.to_be_bytes());
                    }
                }
                out.extend_from_slice(&1u16.to_be_bytes());
                out.extend_from_slice(&name.to_be_bytes());
                out.extend_from_slice(&(body.len() as u32).to_be_bytes());
                out.extend_from_slice(&body);
            }
            None => out.extend_from_slice(&0u16.to_be_bytes()),
        }
        out
    }
}

fn encode_members(pool: &mut PoolBuilder, members: &[MemberSpec]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(members.len() as u16).to_be_bytes());
    for member in members {
        let name = pool.utf8(&member.name);
        let descriptor = pool.utf8(&member.descriptor);
        out.extend_from_slice(&member.access.to_be_bytes());
        out.extend_from_slice(&name.to_be_bytes());
        out.extend_from_slice(&descriptor.to_be_bytes());
        match &member.code {
            Some(code) => {
                let attr_name = pool.utf8("Code");
                let mut body = Vec::new();
                body.extend_from_slice(&8u16.to_be_bytes());
                body.extend_from_slice(&8u16.to_be_bytes());
                body.extend_from_slice(&(code.len() as u32).to_be_bytes());
                body.extend_from_slice(code);
                // exception_table_length, attributes_count
                body.extend_from_slice(&0u16.to_be_bytes());
                body.extend_from_slice(&0u16.to_be_bytes());

                out.extend_from_slice(&1u16.to_be_bytes());
                out.extend_from_slice(&attr_name.to_be_bytes());
                out.extend_from_slice(&(body.len() as u32).to_be_bytes());
                out.extend_from_slice(&body);
            }
            None => out.extend_from_slice(&0u16.to_be_bytes()),
        }
    }
    out
}

/// Writes bytecode for one method body.
pub struct CodeBuilder<'a> {
    pool: &'a mut PoolBuilder,
    bootstrap_methods: &'a mut Vec<(u16, Vec<u16>)>,
    code: Vec<u8>,
}

impl CodeBuilder<'_> {
    /// Appends raw bytes (opcodes and operands).
    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.code.extend_from_slice(bytes);
        self
    }

    fn invoke(&mut self, opcode: u8, owner: &str, name: &str, descriptor: &str, itf: bool) -> &mut Self {
        let index = self.pool.method_ref(owner, name, descriptor, itf);
        self.code.push(opcode);
        self.code.extend_from_slice(&index.to_be_bytes());
        self
    }

    pub fn invokevirtual(&mut self, owner: &str, name: &str, descriptor: &str) -> &mut Self {
        self.invoke(0xb6, owner, name, descriptor, false)
    }

    pub fn invokespecial(&mut self, owner: &str, name: &str, descriptor: &str) -> &mut Self {
        self.invoke(0xb7, owner, name, descriptor, false)
    }

    pub fn invokestatic(&mut self, owner: &str, name: &str, descriptor: &str) -> &mut Self {
        self.invoke(0xb8, owner, name, descriptor, false)
    }

    /// `invokestatic` of an interface's static method (`InterfaceMethodref`).
    pub fn invokestatic_interface(&mut self, owner: &str, name: &str, descriptor: &str) -> &mut Self {
        self.invoke(0xb8, owner, name, descriptor, true)
    }

    pub fn invokeinterface(&mut self, owner: &str, name: &str, descriptor: &str) -> &mut Self {
        self.invoke(0xb9, owner, name, descriptor, true);
        // count, 0
        self.code.extend_from_slice(&[1, 0]);
        self
    }

    /// `getstatic`, used to pad bodies with non-invocation instructions.
    pub fn getstatic(&mut self, owner: &str, name: &str, descriptor: &str) -> &mut Self {
        let index = self.pool.member_ref(9, owner, name, descriptor);
        self.code.push(0xb2);
        self.code.extend_from_slice(&index.to_be_bytes());
        self
    }

    /// `ldc` of a string constant.
    pub fn ldc_string(&mut self, value: &str) -> &mut Self {
        let index = self.pool.string(value);
        self.code.push(0x13);
        self.code.extend_from_slice(&index.to_be_bytes());
        self
    }

    /// Emits an `invokedynamic` bootstrapped by an arbitrary static method.
    pub fn invokedynamic(
        &mut self,
        bootstrap_owner: &str,
        bootstrap_name: &str,
        bootstrap_descriptor: &str,
        args: &[BootstrapArg],
        name: &str,
        descriptor: &str,
    ) -> &mut Self {
        let handle = self
            .pool
            .method_handle(6, bootstrap_owner, bootstrap_name, bootstrap_descriptor, false);
        let args = args
            .iter()
            .map(|arg| match arg {
                BootstrapArg::Handle {
                    kind,
                    owner,
                    name,
                    descriptor,
                    is_interface,
                } => self
                    .pool
                    .method_handle(*kind, owner, name, descriptor, *is_interface),
                BootstrapArg::MethodType(descriptor) => self.pool.method_type(descriptor),
                BootstrapArg::String(value) => self.pool.string(value),
                BootstrapArg::Integer(value) => self.pool.integer(*value),
            })
            .collect();
        let bootstrap_index = self.bootstrap_methods.len() as u16;
        self.bootstrap_methods.push((handle, args));

        let nat = self.pool.name_and_type(name, descriptor);
        let indy = self.pool.indexed(18, &[bootstrap_index, nat]);
        self.code.push(0xba);
        self.code.extend_from_slice(&indy.to_be_bytes());
        self.code.extend_from_slice(&[0, 0]);
        self
    }

    /// Emits the `invokedynamic` javac produces for a `Runnable` lambda or
    /// method reference whose implementation is the given handle.
    pub fn lambda(
        &mut self,
        kind: u8,
        owner: &str,
        name: &str,
        descriptor: &str,
        is_interface: bool,
    ) -> &mut Self {
        let args = [
            BootstrapArg::MethodType("()V".to_string()),
            BootstrapArg::Handle {
                kind,
                owner: owner.to_string(),
                name: name.to_string(),
                descriptor: descriptor.to_string(),
                is_interface,
            },
            BootstrapArg::MethodType("()V".to_string()),
        ];
        self.invokedynamic(
            "java/lang/invoke/LambdaMetafactory",
            "metafactory",
            LAMBDA_METAFACTORY_DESC,
            &args,
            "run",
            "()Ljava/lang/Runnable;",
        )
    }

    pub fn pop(&mut self) -> &mut Self {
        self.code.push(0x57);
        self
    }
}
