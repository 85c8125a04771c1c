//! Assembles small but well-formed class files in-process.
//!
//! Names may be given in dotted or internal form; both end up internal in
//! the constant pool.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_PRIVATE: u16 = 0x0002;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_FINAL: u16 = 0x0010;
pub const ACC_SUPER: u16 = 0x0020;
pub const ACC_INTERFACE: u16 = 0x0200;
pub const ACC_ABSTRACT: u16 = 0x0400;
pub const ACC_ANNOTATION: u16 = 0x2000;
pub const ACC_ENUM: u16 = 0x4000;

const JAVA_8: u16 = 52;

fn internal(name: &str) -> String {
    name.replace('.', "/")
}

/// One instruction of a method body.
#[derive(Debug, Clone)]
pub enum Insn {
    /// Following instructions belong to this source line.
    Line(u16),
    GetField(&'static str, &'static str, &'static str),
    PutField(&'static str, &'static str, &'static str),
    GetStatic(&'static str, &'static str, &'static str),
    InvokeVirtual(&'static str, &'static str, &'static str),
    InvokeSpecial(&'static str, &'static str, &'static str),
    InvokeStatic(&'static str, &'static str, &'static str),
    InvokeInterface(&'static str, &'static str, &'static str),
    New(&'static str),
    CheckCast(&'static str),
    InstanceOf(&'static str),
    LdcClass(&'static str),
    /// `iconst_0`, a filler without references.
    Nop,
}

/// An annotation element value.
#[derive(Debug, Clone)]
pub enum Element {
    Str(&'static str),
    Int(i32),
    Enum(&'static str, &'static str),
    Class(&'static str),
}

#[derive(Debug, Clone)]
pub struct Annotation {
    descriptor: String,
    elements: Vec<(&'static str, Element)>,
}

impl Annotation {
    /// Annotation of the named type, e.g. `com.example.Service`.
    pub fn of(type_name: &str) -> Self {
        Self {
            descriptor: format!("L{};", internal(type_name)),
            elements: Vec::new(),
        }
    }

    pub fn element(mut self, name: &'static str, value: Element) -> Self {
        self.elements.push((name, value));
        self
    }
}

#[derive(Debug, Clone)]
struct Field {
    name: String,
    descriptor: String,
    flags: u16,
    annotations: Vec<Annotation>,
}

#[derive(Debug, Clone)]
pub struct Method {
    name: String,
    descriptor: String,
    flags: u16,
    code: Option<Vec<Insn>>,
    throws: Vec<String>,
    catches: Vec<String>,
    annotations: Vec<Annotation>,
}

impl Method {
    pub fn new(name: &str, descriptor: &str) -> Self {
        Self {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            flags: ACC_PUBLIC,
            code: Some(Vec::new()),
            throws: Vec::new(),
            catches: Vec::new(),
            annotations: Vec::new(),
        }
    }

    /// A method without a `Code` attribute.
    pub fn abstract_method(name: &str, descriptor: &str) -> Self {
        Self {
            flags: ACC_PUBLIC | ACC_ABSTRACT,
            code: None,
            ..Self::new(name, descriptor)
        }
    }

    pub fn flags(mut self, flags: u16) -> Self {
        self.flags = flags;
        self
    }

    pub fn code(mut self, code: Vec<Insn>) -> Self {
        self.code = Some(code);
        self
    }

    pub fn throws(mut self, class: &str) -> Self {
        self.throws.push(internal(class));
        self
    }

    pub fn catches(mut self, class: &str) -> Self {
        self.catches.push(internal(class));
        self
    }

    pub fn annotated(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }
}

/// Builder for one class file.
#[derive(Debug, Clone)]
pub struct ClassBuilder {
    name: String,
    flags: u16,
    super_name: Option<String>,
    interfaces: Vec<String>,
    fields: Vec<Field>,
    methods: Vec<Method>,
    annotations: Vec<Annotation>,
    source_file: Option<String>,
    inner: Option<(Option<String>, Option<String>, u16)>,
    enclosing_method: Option<(String, Option<(String, String)>)>,
    major: u16,
}

impl ClassBuilder {
    /// A public class extending `java.lang.Object`.
    pub fn class(name: &str) -> Self {
        Self {
            name: internal(name),
            flags: ACC_PUBLIC | ACC_SUPER,
            super_name: Some("java/lang/Object".to_string()),
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            annotations: Vec::new(),
            source_file: None,
            inner: None,
            enclosing_method: None,
            major: JAVA_8,
        }
    }

    /// A public interface.
    pub fn interface(name: &str) -> Self {
        Self {
            flags: ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT,
            ..Self::class(name)
        }
    }

    /// `java.lang.Object` itself: no superclass.
    pub fn root() -> Self {
        Self {
            super_name: None,
            ..Self::class("java.lang.Object")
        }
    }

    pub fn flags(mut self, flags: u16) -> Self {
        self.flags = flags;
        self
    }

    pub fn extends(mut self, name: &str) -> Self {
        self.super_name = Some(internal(name));
        self
    }

    pub fn implements(mut self, name: &str) -> Self {
        self.interfaces.push(internal(name));
        self
    }

    pub fn field(mut self, name: &str, descriptor: &str) -> Self {
        self.fields.push(Field {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            flags: ACC_PRIVATE,
            annotations: Vec::new(),
        });
        self
    }

    pub fn annotated_field(mut self, name: &str, descriptor: &str, annotation: Annotation) -> Self {
        self.fields.push(Field {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            flags: ACC_PRIVATE,
            annotations: vec![annotation],
        });
        self
    }

    pub fn method(mut self, method: Method) -> Self {
        self.methods.push(method);
        self
    }

    /// Adds `<init>()V` calling the superclass constructor.
    pub fn default_constructor(self) -> Self {
        let owner: &'static str = match &self.super_name {
            Some(s) => Box::leak(s.clone().into_boxed_str()),
            None => "java/lang/Object",
        };
        self.method(
            Method::new("<init>", "()V").code(vec![Insn::InvokeSpecial(owner, "<init>", "()V")]),
        )
    }

    pub fn annotated(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn source_file(mut self, name: &str) -> Self {
        self.source_file = Some(name.to_string());
        self
    }

    /// Member class of `outer` with the given simple name and source flags.
    pub fn member_of(mut self, outer: &str, simple_name: &str, flags: u16) -> Self {
        self.inner = Some((Some(internal(outer)), Some(simple_name.to_string()), flags));
        self
    }

    /// Anonymous class declared in `outer.method`.
    pub fn anonymous_in(mut self, outer: &str, method: Option<(&str, &str)>) -> Self {
        self.inner = Some((None, None, 0));
        self.enclosing_method = Some((
            internal(outer),
            method.map(|(n, d)| (n.to_string(), d.to_string())),
        ));
        self
    }

    pub fn major_version(mut self, major: u16) -> Self {
        self.major = major;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut cp = Pool::default();
        let mut body = Vec::new();

        push_u16(&mut body, self.flags);
        push_u16(&mut body, cp.class(&self.name));
        push_u16(&mut body, self.super_name.as_ref().map_or(0, |s| cp.class(s)));
        push_u16(&mut body, self.interfaces.len() as u16);
        for i in &self.interfaces {
            push_u16(&mut body, cp.class(i));
        }

        push_u16(&mut body, self.fields.len() as u16);
        for f in &self.fields {
            push_u16(&mut body, f.flags);
            push_u16(&mut body, cp.utf8(&f.name));
            push_u16(&mut body, cp.utf8(&f.descriptor));
            let mut attrs = Vec::new();
            if !f.annotations.is_empty() {
                attrs.push(annotations_attribute(&mut cp, &f.annotations));
            }
            write_attributes(&mut body, &attrs);
        }

        push_u16(&mut body, self.methods.len() as u16);
        for m in &self.methods {
            push_u16(&mut body, m.flags);
            push_u16(&mut body, cp.utf8(&m.name));
            push_u16(&mut body, cp.utf8(&m.descriptor));
            let mut attrs = Vec::new();
            if let Some(code) = &m.code {
                attrs.push(code_attribute(&mut cp, code, &m.catches));
            }
            if !m.throws.is_empty() {
                let mut info = Vec::new();
                push_u16(&mut info, m.throws.len() as u16);
                for t in &m.throws {
                    push_u16(&mut info, cp.class(t));
                }
                attrs.push((cp.utf8("Exceptions"), info));
            }
            if !m.annotations.is_empty() {
                attrs.push(annotations_attribute(&mut cp, &m.annotations));
            }
            write_attributes(&mut body, &attrs);
        }

        let mut attrs = Vec::new();
        if let Some(file) = &self.source_file {
            let mut info = Vec::new();
            push_u16(&mut info, cp.utf8(file));
            attrs.push((cp.utf8("SourceFile"), info));
        }
        if !self.annotations.is_empty() {
            attrs.push(annotations_attribute(&mut cp, &self.annotations));
        }
        if let Some((outer, simple, flags)) = &self.inner {
            let mut info = Vec::new();
            push_u16(&mut info, 1);
            push_u16(&mut info, cp.class(&self.name));
            push_u16(&mut info, outer.as_ref().map_or(0, |o| cp.class(o)));
            push_u16(&mut info, simple.as_ref().map_or(0, |s| cp.utf8(s)));
            push_u16(&mut info, *flags);
            attrs.push((cp.utf8("InnerClasses"), info));
        }
        if let Some((outer, method)) = &self.enclosing_method {
            let mut info = Vec::new();
            push_u16(&mut info, cp.class(outer));
            push_u16(
                &mut info,
                method.as_ref().map_or(0, |(n, d)| cp.name_and_type(n, d)),
            );
            attrs.push((cp.utf8("EnclosingMethod"), info));
        }
        write_attributes(&mut body, &attrs);

        let mut out = Vec::new();
        push_u32(&mut out, 0xCAFE_BABE);
        push_u16(&mut out, 0);
        push_u16(&mut out, self.major);
        cp.write(&mut out);
        out.extend_from_slice(&body);
        out
    }

    /// Path of the class file relative to a class directory.
    pub fn relative_path(&self) -> String {
        format!("{}.class", self.name)
    }
}

fn push_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn push_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn write_attributes(out: &mut Vec<u8>, attrs: &[(u16, Vec<u8>)]) {
    push_u16(out, attrs.len() as u16);
    for (name, info) in attrs {
        push_u16(out, *name);
        push_u32(out, info.len() as u32);
        out.extend_from_slice(info);
    }
}

fn code_attribute(cp: &mut Pool, insns: &[Insn], catches: &[String]) -> (u16, Vec<u8>) {
    let mut code = Vec::new();
    let mut lines: Vec<(u16, u16)> = Vec::new();
    for insn in insns {
        let member = |cp: &mut Pool, tag: u8, o: &str, n: &str, d: &str| cp.member(tag, o, n, d);
        match insn {
            Insn::Line(line) => lines.push((code.len() as u16, *line)),
            Insn::GetField(o, n, d) => emit(&mut code, 0xb4, member(cp, 9, o, n, d)),
            Insn::PutField(o, n, d) => emit(&mut code, 0xb5, member(cp, 9, o, n, d)),
            Insn::GetStatic(o, n, d) => emit(&mut code, 0xb2, member(cp, 9, o, n, d)),
            Insn::InvokeVirtual(o, n, d) => emit(&mut code, 0xb6, member(cp, 10, o, n, d)),
            Insn::InvokeSpecial(o, n, d) => emit(&mut code, 0xb7, member(cp, 10, o, n, d)),
            Insn::InvokeStatic(o, n, d) => emit(&mut code, 0xb8, member(cp, 10, o, n, d)),
            Insn::InvokeInterface(o, n, d) => {
                emit(&mut code, 0xb9, member(cp, 11, o, n, d));
                code.extend_from_slice(&[1, 0]);
            }
            Insn::New(c) => emit(&mut code, 0xbb, cp.class(&internal(c))),
            Insn::CheckCast(c) => emit(&mut code, 0xc0, cp.class(&internal(c))),
            Insn::InstanceOf(c) => emit(&mut code, 0xc1, cp.class(&internal(c))),
            Insn::LdcClass(c) => emit(&mut code, 0x13, cp.class(&internal(c))),
            Insn::Nop => code.push(0x03),
        }
    }
    let handler_pc = code.len() as u16;
    code.push(0xb1); // return

    let mut info = Vec::new();
    push_u16(&mut info, 8); // max_stack
    push_u16(&mut info, 8); // max_locals
    push_u32(&mut info, code.len() as u32);
    info.extend_from_slice(&code);
    push_u16(&mut info, catches.len() as u16);
    for c in catches {
        push_u16(&mut info, 0);
        push_u16(&mut info, handler_pc);
        push_u16(&mut info, handler_pc);
        push_u16(&mut info, cp.class(c));
    }
    if lines.is_empty() {
        push_u16(&mut info, 0);
    } else {
        push_u16(&mut info, 1);
        let mut table = Vec::new();
        push_u16(&mut table, lines.len() as u16);
        for (pc, line) in &lines {
            push_u16(&mut table, *pc);
            push_u16(&mut table, *line);
        }
        push_u16(&mut info, cp.utf8("LineNumberTable"));
        push_u32(&mut info, table.len() as u32);
        info.extend_from_slice(&table);
    }
    (cp.utf8("Code"), info)
}

fn emit(code: &mut Vec<u8>, opcode: u8, index: u16) {
    code.push(opcode);
    push_u16(code, index);
}

fn annotations_attribute(cp: &mut Pool, annotations: &[Annotation]) -> (u16, Vec<u8>) {
    let mut info = Vec::new();
    push_u16(&mut info, annotations.len() as u16);
    for a in annotations {
        push_u16(&mut info, cp.utf8(&a.descriptor));
        push_u16(&mut info, a.elements.len() as u16);
        for (name, value) in &a.elements {
            push_u16(&mut info, cp.utf8(name));
            match value {
                Element::Str(s) => {
                    info.push(b's');
                    push_u16(&mut info, cp.utf8(s));
                }
                Element::Int(i) => {
                    info.push(b'I');
                    push_u16(&mut info, cp.integer(*i));
                }
                Element::Enum(ty, constant) => {
                    info.push(b'e');
                    push_u16(&mut info, cp.utf8(&format!("L{};", internal(ty))));
                    push_u16(&mut info, cp.utf8(constant));
                }
                Element::Class(ty) => {
                    info.push(b'c');
                    push_u16(&mut info, cp.utf8(&format!("L{};", internal(ty))));
                }
            }
        }
    }
    (cp.utf8("RuntimeVisibleAnnotations"), info)
}

#[derive(Default)]
struct Pool {
    entries: Vec<Vec<u8>>,
    index: HashMap<Vec<u8>, u16>,
}

impl Pool {
    fn add(&mut self, entry: Vec<u8>) -> u16 {
        if let Some(i) = self.index.get(&entry) {
            return *i;
        }
        let i = self.entries.len() as u16 + 1;
        self.index.insert(entry.clone(), i);
        self.entries.push(entry);
        i
    }

    fn utf8(&mut self, s: &str) -> u16 {
        let mut e = vec![1];
        push_u16(&mut e, s.len() as u16);
        e.extend_from_slice(s.as_bytes());
        self.add(e)
    }

    fn integer(&mut self, value: i32) -> u16 {
        let mut e = vec![3];
        e.extend_from_slice(&value.to_be_bytes());
        self.add(e)
    }

    fn class(&mut self, name: &str) -> u16 {
        let name = self.utf8(&internal(name));
        let mut e = vec![7];
        push_u16(&mut e, name);
        self.add(e)
    }

    fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let n = self.utf8(name);
        let d = self.utf8(descriptor);
        let mut e = vec![12];
        push_u16(&mut e, n);
        push_u16(&mut e, d);
        self.add(e)
    }

    fn member(&mut self, tag: u8, owner: &str, name: &str, descriptor: &str) -> u16 {
        let class = self.class(owner);
        let nat = self.name_and_type(name, descriptor);
        let mut e = vec![tag];
        push_u16(&mut e, class);
        push_u16(&mut e, nat);
        self.add(e)
    }

    fn write(&self, out: &mut Vec<u8>) {
        push_u16(out, self.entries.len() as u16 + 1);
        for e in &self.entries {
            out.extend_from_slice(e);
        }
    }
}

/// Writes the classes below `dir` in package directories.
pub fn write_class_dir(dir: &Path, classes: &[ClassBuilder]) {
    for class in classes {
        let path = dir.join(class.relative_path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, class.build()).unwrap();
    }
}

/// Writes the classes into a new jar at `path`.
pub fn write_jar(path: &Path, classes: &[ClassBuilder]) {
    let file = std::fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();
    zip.start_file("META-INF/MANIFEST.MF", options).unwrap();
    zip.write_all(b"Manifest-Version: 1.0\n").unwrap();
    for class in classes {
        zip.start_file(class.relative_path(), options).unwrap();
        zip.write_all(&class.build()).unwrap();
    }
    zip.finish().unwrap();
}

/// `(name, bytes)` pairs for in-memory imports.
pub fn in_memory(classes: &[ClassBuilder]) -> Vec<(String, Vec<u8>)> {
    classes
        .iter()
        .map(|c| (c.name.replace('/', "."), c.build()))
        .collect()
}

/// A small layered code base:
///
/// - `com.shop.domain`: `Entity` (interface with a default method),
///   `Base implements Entity`, `Order extends Base`, `Customer`
/// - `com.shop.web.OrderController`, annotated with a framework stub,
///   constructing and calling `Order`
///
/// `java.lang.Object`, `java.lang.String` and the annotation type are
/// left out and end up as stubs.
pub fn shop() -> Vec<ClassBuilder> {
    vec![
        ClassBuilder::interface("com.shop.domain.Entity")
            .source_file("Entity.java")
            .method(
                Method::new("describe", "()Ljava/lang/String;")
                    .code(vec![Insn::Line(5), Insn::Nop]),
            ),
        ClassBuilder::class("com.shop.domain.Base")
            .flags(ACC_PUBLIC | ACC_SUPER | ACC_ABSTRACT)
            .implements("com.shop.domain.Entity")
            .source_file("Base.java")
            .field("id", "J")
            .default_constructor()
            .method(Method::new("save", "()V").code(vec![Insn::Line(12), Insn::Nop])),
        ClassBuilder::class("com.shop.domain.Customer")
            .source_file("Customer.java")
            .field("name", "Ljava/lang/String;")
            .default_constructor(),
        ClassBuilder::class("com.shop.domain.Order")
            .extends("com.shop.domain.Base")
            .source_file("Order.java")
            .field("customer", "Lcom/shop/domain/Customer;")
            .field("items", "[[Lcom/shop/domain/Customer;")
            .field("count", "I")
            .default_constructor()
            .method(Method::new("total", "()I").code(vec![
                Insn::Line(20),
                Insn::InvokeVirtual("com/shop/domain/Order", "save", "()V"),
                Insn::Line(21),
                Insn::GetField("com/shop/domain/Order", "id", "J"),
                Insn::Line(22),
                Insn::InvokeVirtual("com/shop/domain/Order", "describe", "()Ljava/lang/String;"),
                Insn::PutField("com/shop/domain/Order", "count", "I"),
            ])),
        ClassBuilder::class("com.shop.web.OrderController")
            .source_file("OrderController.java")
            .annotated(Annotation::of("org.framework.Controller"))
            .default_constructor()
            .method(
                Method::new("handle", "(Lcom/shop/domain/Order;)V")
                    .throws("java.io.IOException")
                    .code(vec![
                        Insn::Line(10),
                        Insn::New("com/shop/domain/Order"),
                        Insn::InvokeSpecial("com/shop/domain/Order", "<init>", "()V"),
                        Insn::Line(11),
                        Insn::InvokeVirtual("com/shop/domain/Order", "total", "()I"),
                        Insn::CheckCast("com/shop/domain/Customer"),
                    ]),
            ),
    ]
}
