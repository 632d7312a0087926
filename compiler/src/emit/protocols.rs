//! Protocol bindings.
//!
//! For a protocol `Calculator` the domain fragment holds `CalculatorMarker`;
//! the bindings fragment holds the ordinal constants, payload structs,
//! result unions, the `Calculator` server trait, `CalculatorEvent`,
//! `CalculatorSyncProxy`, `CalculatorProxy`, `CalculatorEventSender` and
//! `CalculatorStub`. The test base adds `CalculatorTestBase`.

use std::collections::BTreeSet;

use crate::error::GenError;
use crate::layout::Shape;
use crate::mapper::{TypeBinding, TypeKind, TypeMapper, RUNTIME};
use crate::names::{const_name, member_name, to_pascal_case, type_name};
use crate::types::{Method, Protocol};
use crate::utils::doc_comment;

use super::unions::{UnionSpec, Variant};
use super::{collect_libraries, struct_codec, struct_fields, struct_item, Emission, FieldSpec, Fragment, RESULT};

/// Inherent methods of the generated proxies, stub and test base. A protocol
/// method spelled the same way gets a `_` suffix.
const HELPER_METHODS: [&str; 9] =
    ["new", "into_inner", "get_ref", "get_mut", "dispatch", "serve", "wait_for_event", "next_event", "not_implemented"];

fn method_name(name: &str) -> String {
    let rust = member_name(name);
    if HELPER_METHODS.contains(&rust.as_str()) {
        format!("{}_", rust)
    } else {
        rust
    }
}

/// A request, response or event body.
struct Payload {
    /// `None` for an empty body, which travels as `()`.
    name:   Option<String>,
    fields: Vec<FieldSpec>,
    shape:  Shape,
}

impl Payload {
    fn rust(&self) -> &str {
        self.name.as_deref().unwrap_or("()")
    }

    /// `name: Type, ...` for a method signature.
    fn params(&self, prefix: &str) -> String {
        self.fields.iter().map(|f| format!(", {}{}: {}", prefix, f.name, f.binding.rust)).collect()
    }

    /// `a, b` forwarding every parameter.
    fn args(&self, source: &str) -> String {
        self.fields.iter().map(|f| format!("{}{}", source, f.name)).collect::<Vec<_>>().join(", ")
    }

    /// Expression building the payload from parameters of the same names.
    fn construct(&self) -> String {
        match &self.name {
            None => "()".to_string(),
            Some(name) => format!("{} {{ {} }}", name, self.args("")),
        }
    }
}

struct MethodPlan<'a> {
    method:   &'a Method,
    rust:     String,
    pascal:   String,
    ordinal:  String,
    request:  Option<Payload>,
    response: Option<Payload>,
    error:    Option<TypeBinding>,
    /// Name of the result union of a method with an error domain.
    result:   Option<String>,
}

impl MethodPlan<'_> {
    /// What the server trait method returns, or `None` for one-way methods.
    fn reply_type(&self) -> Option<String> {
        let response = self.response.as_ref()?;
        Some(match &self.error {
            Some(error) => format!("{}<{}, {}>", RESULT, response.rust(), error.rust),
            None => response.rust().to_string(),
        })
    }

    fn request_params(&self, prefix: &str) -> String {
        self.request.as_ref().map(|r| r.params(prefix)).unwrap_or_default()
    }
}

pub fn emit(mapper: &TypeMapper<'_>, decl: &Protocol) -> Result<Emission, GenError> {
    let protocol = type_name(&decl.name.name);
    let marker = format!("{}Marker", protocol);
    let wire_name = format!("{}.{}", decl.name.library, decl.name.name);

    let mut libraries = BTreeSet::new();
    let mut plans = Vec::with_capacity(decl.methods.len());
    for method in &decl.methods {
        let pascal = to_pascal_case(&method.name);
        let payload = |suffix: &str, params: &[crate::types::Parameter]| -> Result<Payload, GenError> {
            let (fields, shape) = struct_fields(
                mapper,
                params.iter().map(|p| (p.name.as_str(), &p.ty, p.offset, None)),
            )?;
            let name = (!fields.is_empty()).then(|| format!("{}{}{}", protocol, pascal, suffix));
            Ok(Payload { name, fields, shape })
        };
        for param in method.request.iter().chain(&method.response) {
            collect_libraries(&param.ty, mapper.library(), &mut libraries);
        }
        if let Some(error) = &method.error {
            collect_libraries(error, mapper.library(), &mut libraries);
        }

        let request = if method.has_request { Some(payload("Request", &method.request)?) } else { None };
        let response = match (method.has_request, method.has_response) {
            (_, false) => None,
            (true, true) => Some(payload("Response", &method.response)?),
            (false, true) => Some(payload("Event", &method.response)?),
        };
        let error = match (&method.error, method.is_two_way()) {
            (Some(error), true) => Some(mapper.bind(error)?),
            _ => None,
        };
        let result = error.as_ref().map(|_| format!("{}{}Result", protocol, pascal));
        plans.push(MethodPlan {
            method,
            rust: method_name(&method.name),
            pascal,
            ordinal: format!("{}_ORDINAL", const_name(&method.name)),
            request,
            response,
            error,
            result,
        });
    }

    let emitter = ProtocolEmitter { protocol: &protocol, marker: &marker, doc: decl.doc.as_deref(), plans };

    let mut domain = doc_comment(decl.doc.as_deref(), "");
    domain.push_str("#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]\n");
    domain.push_str(&format!("pub struct {};\n\n", marker));
    domain.push_str(&format!(
        "impl {}::ProtocolMarker for {} {{\n    const NAME: &'static str = {:?};\n}}\n",
        RUNTIME, marker, wire_name
    ));

    let mut emission = Emission::domain(&decl.name, Fragment { declarations: domain, codecs: String::new() });
    emission.bindings = Fragment { declarations: emitter.declarations(), codecs: emitter.codecs(&wire_name) };
    emission.test_base = emitter.test_base();
    emission.binding_libraries = libraries;
    Ok(emission)
}

struct ProtocolEmitter<'a> {
    protocol: &'a str,
    marker:   &'a str,
    doc:      Option<&'a str>,
    plans:    Vec<MethodPlan<'a>>,
}

impl<'a> ProtocolEmitter<'a> {
    fn events(&self) -> impl Iterator<Item = &MethodPlan<'a>> {
        self.plans.iter().filter(|p| p.request.is_none())
    }

    fn requests(&self) -> impl Iterator<Item = &MethodPlan<'a>> {
        self.plans.iter().filter(|p| p.request.is_some())
    }

    /// Every non-empty payload, requests before responses per method.
    fn payloads(&self) -> Vec<&Payload> {
        self.plans
            .iter()
            .flat_map(|p| p.request.iter().chain(&p.response))
            .filter(|p| p.name.is_some())
            .collect()
    }

    fn declarations(&self) -> String {
        let mut blocks = Vec::new();

        let ordinals: String = self
            .plans
            .iter()
            .map(|p| format!("    pub const {}: u64 = {:#x};\n", p.ordinal, p.method.ordinal))
            .collect();
        blocks.push(format!("impl {} {{\n{}}}\n", self.marker, ordinals));

        for payload in self.payloads() {
            if let Some(name) = &payload.name {
                blocks.push(struct_item(name, None, &payload.fields));
            }
        }
        for plan in &self.plans {
            if let Some(union) = result_union(plan) {
                blocks.push(union.declaration());
            }
        }

        let mut server = doc_comment(self.doc, "");
        server.push_str(&format!("pub trait {} {{\n", self.protocol));
        let methods: Vec<String> = self
            .requests()
            .map(|plan| {
                let mut out = doc_comment(plan.method.doc.as_deref(), "    ");
                out.push_str(&self.server_signature(plan, ""));
                out.push_str(";\n");
                out
            })
            .collect();
        server.push_str(&methods.join("\n"));
        server.push_str("}\n");
        blocks.push(server);

        if self.events().next().is_some() {
            let mut events = format!("/// Events sent by the server side of [`{}`].\n", self.marker);
            events.push_str(super::DATA_DERIVES);
            events.push_str(&format!("\npub enum {}Event {{\n", self.protocol));
            for plan in self.events() {
                events.push_str(&doc_comment(plan.method.doc.as_deref(), "    "));
                match plan.response.as_ref().and_then(|r| r.name.as_deref()) {
                    Some(payload) => events.push_str(&format!("    {}({}),\n", plan.pascal, payload)),
                    None => events.push_str(&format!("    {},\n", plan.pascal)),
                }
            }
            events.push_str("}\n");
            blocks.push(events);
        }

        blocks.push(format!(
            "/// Blocking client of [`{m}`].\npub struct {p}SyncProxy<T: {rt}::Transport> {{\n    transport: T,\n    txids:     {rt}::TxidGenerator,\n}}\n",
            m = self.marker,
            p = self.protocol,
            rt = RUNTIME,
        ));
        blocks.push(format!(
            "/// Asynchronous client of [`{m}`].\npub struct {p}Proxy<T: {rt}::AsyncTransport> {{\n    transport: T,\n    txids:     {rt}::TxidGenerator,\n}}\n",
            m = self.marker,
            p = self.protocol,
            rt = RUNTIME,
        ));
        if self.events().next().is_some() {
            blocks.push(format!(
                "pub struct {p}EventSender<T: {rt}::Transport> {{\n    transport: T,\n}}\n",
                p = self.protocol,
                rt = RUNTIME,
            ));
        }
        blocks.push(format!(
            "/// Decodes requests and hands them to an implementation of [`{p}`].\npub struct {p}Stub<I: {p}> {{\n    imp: I,\n}}\n",
            p = self.protocol,
        ));

        blocks.join("\n")
    }

    /// `fn name(&mut self, a: A) -> R` as declared on the server trait.
    fn server_signature(&self, plan: &MethodPlan<'_>, prefix: &str) -> String {
        let mut out = format!("    fn {}(&mut self{})", plan.rust, plan.request_params(prefix));
        if let Some(reply) = plan.reply_type().filter(|r| r != "()") {
            out.push_str(&format!(" -> {}", reply));
        }
        out
    }

    fn codecs(&self, wire_name: &str) -> String {
        let mut blocks = Vec::new();
        for payload in self.payloads() {
            if let Some(name) = &payload.name {
                blocks.push(struct_codec(name, &payload.fields, payload.shape));
            }
        }
        for plan in &self.plans {
            if let Some(union) = result_union(plan) {
                blocks.push(union.codec());
                blocks.push(result_conversions(&union, plan));
            }
        }
        if self.events().next().is_some() {
            blocks.push(self.event_decoder());
        }
        blocks.push(self.sync_proxy());
        blocks.push(self.async_proxy());
        if self.events().next().is_some() {
            blocks.push(self.event_sender());
        }
        blocks.push(self.stub(wire_name));
        blocks.join("\n")
    }

    fn unknown_ordinal(&self) -> String {
        format!(
            "ordinal => Err({rt}::Error::UnknownOrdinal {{\n                protocol: <{m} as {rt}::ProtocolMarker>::NAME,\n                ordinal,\n            }}),\n",
            rt = RUNTIME,
            m = self.marker,
        )
    }

    fn event_decoder(&self) -> String {
        let mut out = format!("impl {}Event {{\n", self.protocol);
        out.push_str(&format!(
            "    pub fn decode(message: &{rt}::Message) -> {res}<Self, {rt}::Error> {{\n",
            rt = RUNTIME,
            res = RESULT
        ));
        out.push_str("        let header = message.header()?;\n        match header.ordinal {\n");
        for plan in self.events() {
            let arm = match plan.response.as_ref().and_then(|r| r.name.as_deref()) {
                Some(payload) => format!("Ok(Self::{}(message.decode_body::<{}>()?))", plan.pascal, payload),
                None => format!("{{\n                message.decode_body::<()>()?;\n                Ok(Self::{})\n            }}", plan.pascal),
            };
            out.push_str(&format!("            {}::{} => {},\n", self.marker, plan.ordinal, arm));
        }
        out.push_str(&format!("            {}", self.unknown_ordinal()));
        out.push_str("        }\n    }\n}\n");
        out
    }

    /// The `Result<_, Error>` a proxy method returns.
    fn proxy_return(&self, plan: &MethodPlan<'_>) -> String {
        let value = match (&plan.response, &plan.error) {
            (None, _) => "()".to_string(),
            (Some(response), None) => response.rust().to_string(),
            (Some(response), Some(error)) => format!("{}<{}, {}>", RESULT, response.rust(), error.rust),
        };
        format!("{}<{}, {}::Error>", RESULT, value, RUNTIME)
    }

    /// Statements decoding `reply` into what the proxy method returns.
    fn decode_reply(&self, plan: &MethodPlan<'_>) -> String {
        let ordinal = format!("{}::{}", self.marker, plan.ordinal);
        match (&plan.response, &plan.result) {
            (Some(_), Some(result)) => format!(
                "        let result = reply.decode_reply::<{}>({})?;\n        Ok(result.into_result())\n",
                result, ordinal
            ),
            (Some(response), None) => format!("        reply.decode_reply::<{}>({})\n", response.rust(), ordinal),
            (None, _) => String::new(),
        }
    }

    fn proxy_header(&self, kind: &str, bound: &str) -> String {
        format!(
            "impl<T: {rt}::{b}> {p}{k}<T> {{\n    pub fn new(transport: T) -> Self {{\n        Self {{ transport, txids: {rt}::TxidGenerator::new() }}\n    }}\n\n    pub fn into_inner(self) -> T {{\n        self.transport\n    }}\n",
            rt = RUNTIME,
            b = bound,
            p = self.protocol,
            k = kind,
        )
    }

    fn request_message(&self, plan: &MethodPlan<'_>, txid: &str) -> String {
        let mut out = String::new();
        let body = match &plan.request {
            Some(request) if request.name.is_some() => {
                out.push_str(&format!("        let request = {};\n", request.construct()));
                "&request"
            }
            _ => "&()",
        };
        out.push_str(&format!(
            "        let message = {}::Message::encode({}, {}::{}, {})?;\n",
            RUNTIME, txid, self.marker, plan.ordinal, body
        ));
        out
    }

    fn sync_proxy(&self) -> String {
        let mut methods = vec![self.proxy_header("SyncProxy", "Transport")];
        for plan in self.requests() {
            let mut out = doc_comment(plan.method.doc.as_deref(), "    ");
            out.push_str(&format!(
                "    pub fn {}(&self{}) -> {} {{\n",
                plan.rust,
                plan.request_params(""),
                self.proxy_return(plan)
            ));
            if plan.response.is_some() {
                out.push_str(&self.request_message(plan, "txid").replacen(
                    "        let message",
                    "        let txid = self.txids.next();\n        let message",
                    1,
                ));
                out.push_str("        self.transport.send(message)?;\n");
                out.push_str(&format!("        let reply = {}::recv_reply(&self.transport, txid)?;\n", RUNTIME));
                out.push_str(&self.decode_reply(plan));
            } else {
                out.push_str(&self.request_message(plan, "0"));
                out.push_str("        self.transport.send(message)\n");
            }
            out.push_str("    }\n");
            methods.push(out);
        }
        if self.events().next().is_some() {
            methods.push(format!(
                "    /// Blocks until the next event arrives.\n    pub fn wait_for_event(&self) -> {res}<{p}Event, {rt}::Error> {{\n        let message = self.transport.recv()?;\n        {p}Event::decode(&message)\n    }}\n",
                res = RESULT,
                p = self.protocol,
                rt = RUNTIME,
            ));
        }
        format!("{}}}\n", methods.join("\n"))
    }

    fn async_proxy(&self) -> String {
        let mut methods = vec![self.proxy_header("Proxy", "AsyncTransport")];
        for plan in self.requests() {
            let mut out = doc_comment(plan.method.doc.as_deref(), "    ");
            out.push_str(&format!(
                "    pub async fn {}(&self{}) -> {} {{\n",
                plan.rust,
                plan.request_params(""),
                self.proxy_return(plan)
            ));
            if plan.response.is_some() {
                out.push_str(&self.request_message(plan, "self.txids.next()"));
                out.push_str("        let reply = self.transport.call(message).await?;\n");
                out.push_str(&self.decode_reply(plan));
            } else {
                out.push_str(&self.request_message(plan, "0"));
                out.push_str("        self.transport.send(message).await\n");
            }
            out.push_str("    }\n");
            methods.push(out);
        }
        if self.events().next().is_some() {
            methods.push(format!(
                "    pub async fn next_event(&self) -> {res}<{p}Event, {rt}::Error> {{\n        let message = self.transport.recv().await?;\n        {p}Event::decode(&message)\n    }}\n",
                res = RESULT,
                p = self.protocol,
                rt = RUNTIME,
            ));
        }
        format!("{}}}\n", methods.join("\n"))
    }

    fn event_sender(&self) -> String {
        let mut methods = vec![format!(
            "impl<T: {rt}::Transport> {p}EventSender<T> {{\n    pub fn new(transport: T) -> Self {{\n        Self {{ transport }}\n    }}\n",
            rt = RUNTIME,
            p = self.protocol,
        )];
        for plan in self.events() {
            let Some(event) = &plan.response else { continue };
            let mut out = format!(
                "    pub fn send_{}(&self{}) -> {}<(), {}::Error> {{\n",
                plan.rust,
                event.params(""),
                RESULT,
                RUNTIME
            );
            let body = match &event.name {
                Some(_) => {
                    out.push_str(&format!("        let event = {};\n", event.construct()));
                    "&event"
                }
                None => "&()",
            };
            out.push_str(&format!(
                "        self.transport.send({}::Message::encode(0, {}::{}, {})?)\n    }}\n",
                RUNTIME, self.marker, plan.ordinal, body
            ));
            methods.push(out);
        }
        format!("{}}}\n", methods.join("\n"))
    }

    fn stub(&self, wire_name: &str) -> String {
        let p = self.protocol;
        let mut out = format!(
            "impl<I: {p}> {p}Stub<I> {{\n    pub fn new(imp: I) -> Self {{\n        Self {{ imp }}\n    }}\n\n    pub fn get_ref(&self) -> &I {{\n        &self.imp\n    }}\n\n    pub fn get_mut(&mut self) -> &mut I {{\n        &mut self.imp\n    }}\n\n    pub fn into_inner(self) -> I {{\n        self.imp\n    }}\n\n",
            p = p,
        );
        out.push_str(&format!(
            "    /// Handles one request of `{}`. Returns the reply of a two-way method.\n",
            wire_name
        ));
        out.push_str(&format!(
            "    pub fn dispatch(&mut self, message: &{rt}::Message) -> {res}<::std::option::Option<{rt}::Message>, {rt}::Error> {{\n",
            rt = RUNTIME,
            res = RESULT,
        ));
        out.push_str("        let header = message.header()?;\n        match header.ordinal {\n");
        for plan in self.requests() {
            out.push_str(&format!("            {}::{} => {{\n", self.marker, plan.ordinal));
            let args = match &plan.request {
                Some(request) if request.name.is_some() => {
                    out.push_str(&format!(
                        "                let request = message.decode_body::<{}>()?;\n",
                        request.rust()
                    ));
                    request.args("request.")
                }
                _ => {
                    out.push_str("                message.decode_body::<()>()?;\n");
                    String::new()
                }
            };
            let call = format!("self.imp.{}({})", plan.rust, args);
            let reply = match (&plan.response, &plan.result) {
                (None, _) => {
                    out.push_str(&format!("                {};\n", call));
                    None
                }
                (Some(_), Some(result)) => {
                    out.push_str(&format!("                let response = {}::from_result({});\n", result, call));
                    Some("&response")
                }
                (Some(response), None) if response.name.is_none() => {
                    out.push_str(&format!("                {};\n", call));
                    Some("&()")
                }
                (Some(_), None) => {
                    out.push_str(&format!("                let response = {};\n", call));
                    Some("&response")
                }
            };
            match reply {
                Some(body) => out.push_str(&format!(
                    "                Ok(Some({}::Message::encode(header.txid, header.ordinal, {})?))\n",
                    RUNTIME, body
                )),
                None => out.push_str("                Ok(None)\n"),
            }
            out.push_str("            }\n");
        }
        out.push_str(&format!("            {}", self.unknown_ordinal()));
        out.push_str("        }\n    }\n\n");

        out.push_str("    /// Serves requests until the peer closes `transport`.\n");
        out.push_str(&format!(
            "    pub fn serve<T: {rt}::Transport>(&mut self, transport: &T) -> {res}<(), {rt}::Error> {{\n",
            rt = RUNTIME,
            res = RESULT,
        ));
        out.push_str("        loop {\n            let message = match transport.recv() {\n");
        out.push_str("                Ok(message) => message,\n");
        out.push_str(&format!("                Err({}::Error::PeerClosed) => return Ok(()),\n", RUNTIME));
        out.push_str("                Err(err) => return Err(err),\n            };\n");
        out.push_str("            if let Some(reply) = self.dispatch(&message)? {\n");
        out.push_str("                transport.send(reply)?;\n            }\n        }\n    }\n}\n");
        out
    }

    fn test_base(&self) -> String {
        let p = self.protocol;
        let mut out = format!(
            "/// Implements [`{p}`] with every method calling `not_implemented`.\n/// Override the methods a test needs.\npub trait {p}TestBase {{\n    fn not_implemented(&mut self, name: &str) -> !;\n",
            p = p,
        );
        for plan in self.requests() {
            out.push_str(&format!(
                "\n{} {{\n        self.not_implemented({:?})\n    }}\n",
                self.server_signature(plan, "_"),
                plan.method.name
            ));
        }
        out.push_str("}\n\n");

        out.push_str(&format!("impl<T: {p}TestBase> {p} for T {{\n", p = p));
        let forwards: Vec<String> = self
            .requests()
            .map(|plan| {
                let args = plan.request.as_ref().map(|r| r.args("")).unwrap_or_default();
                let args = if args.is_empty() { String::new() } else { format!(", {}", args) };
                format!(
                    "{} {{\n        <Self as {}TestBase>::{}(self{})\n    }}\n",
                    self.server_signature(plan, ""),
                    p,
                    plan.rust,
                    args
                )
            })
            .collect();
        out.push_str(&forwards.join("\n"));
        out.push_str("}\n");
        out
    }
}

/// The union carrying either the response or the error of `plan`.
fn result_union<'p>(plan: &'p MethodPlan<'_>) -> Option<UnionSpec<'p>> {
    let (name, response, error) = (plan.result.as_deref()?, plan.response.as_ref()?, plan.error.as_ref()?);
    let response = TypeBinding {
        rust:        response.rust().to_string(),
        kind:        TypeKind::Struct,
        shape:       response.shape,
        out_of_line: false,
        nullable:    None,
        max_len:     None,
    };
    Some(UnionSpec {
        name,
        wire_name: name.to_string(),
        doc: None,
        variants: vec![
            Variant { ordinal: 1, name: "Response".to_string(), binding: response, doc: None },
            Variant { ordinal: 2, name: "Err".to_string(), binding: error.clone(), doc: None },
        ],
        flexible: false,
    })
}

fn result_conversions(union: &UnionSpec<'_>, plan: &MethodPlan<'_>) -> String {
    let result = plan.reply_type().unwrap_or_default();
    format!(
        "impl {u} {{\n    pub fn into_result(self) -> {r} {{\n        match self {{\n            Self::Response(response) => Ok(response),\n            Self::Err(err) => Err(err),\n        }}\n    }}\n\n    pub fn from_result(result: {r}) -> Self {{\n        match result {{\n            Ok(response) => Self::Response(response),\n            Err(err) => Self::Err(err),\n        }}\n    }}\n}}\n",
        u = union.name,
        r = result,
    )
}
