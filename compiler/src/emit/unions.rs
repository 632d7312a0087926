use std::collections::BTreeSet;

use crate::error::GenError;
use crate::layout::UNION_SHAPE;
use crate::mapper::{TypeBinding, TypeMapper, OPTION, RUNTIME};
use crate::names::{to_pascal_case, type_name};
use crate::types::Union;
use crate::utils::doc_comment;

use super::{
    bounded, boxed_impl, collect_libraries, decode_signature, encode_bound_check, encode_signature, layout_impl,
    Emission, Fragment, DATA_DERIVES,
};

pub(crate) struct Variant {
    pub ordinal: u64,
    pub name:    String,
    pub binding: TypeBinding,
    pub doc:     Option<String>,
}

/// A union in Rust terms: the value enum, its tag enum and their codec.
pub(crate) struct UnionSpec<'a> {
    pub name:      &'a str,
    /// Name reported in decode errors.
    pub wire_name: String,
    pub doc:       Option<&'a str>,
    pub variants:  Vec<Variant>,
    pub flexible:  bool,
}

pub fn emit(mapper: &TypeMapper<'_>, decl: &Union) -> Result<Emission, GenError> {
    let name = type_name(&decl.name.name);
    let mut variants = Vec::new();
    let mut libraries = BTreeSet::new();
    for member in &decl.members {
        if let Some((variant, ty)) = member.field()? {
            collect_libraries(ty, mapper.library(), &mut libraries);
            variants.push(Variant {
                ordinal: member.ordinal,
                name:    crate::names::escape_keyword(&to_pascal_case(variant)),
                binding: mapper.bind(ty)?,
                doc:     member.doc.clone(),
            });
        }
    }
    variants.sort_by_key(|v| v.ordinal);

    let spec = UnionSpec {
        name: &name,
        wire_name: decl.name.to_string(),
        doc: decl.doc.as_deref(),
        variants,
        flexible: decl.flexible,
    };
    let mut emission = Emission::domain(
        &decl.name,
        Fragment { declarations: spec.declaration(), codecs: spec.codec() },
    );
    emission.domain_libraries = libraries;
    Ok(emission)
}

impl UnionSpec<'_> {
    pub(crate) fn tag_name(&self) -> String {
        format!("{}Tag", self.name)
    }

    pub(crate) fn declaration(&self) -> String {
        let mut out = doc_comment(self.doc, "");
        out.push_str(DATA_DERIVES);
        out.push('\n');
        out.push_str(&format!("pub enum {} {{\n", self.name));
        for variant in &self.variants {
            out.push_str(&doc_comment(variant.doc.as_deref(), "    "));
            out.push_str(&format!("    {}({}),\n", variant.name, variant.binding.rust));
        }
        if self.flexible {
            out.push_str(&format!(
                "    #[doc(hidden)]\n    __Unknown {{ ordinal: u64, data: {}::UnknownData }},\n",
                RUNTIME
            ));
        }
        out.push_str("}\n\n");

        out.push_str(&format!("/// Ordinals of the known [`{}`] variants.\n", self.name));
        out.push_str("#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]\n");
        if !self.variants.is_empty() {
            out.push_str("#[repr(u64)]\n");
        }
        out.push_str(&format!("pub enum {} {{\n", self.tag_name()));
        for variant in &self.variants {
            out.push_str(&format!("    {} = {},\n", variant.name, variant.ordinal));
        }
        out.push_str("}\n");
        out
    }

    fn methods(&self) -> String {
        let tag = self.tag_name();
        let mut out = format!("impl {} {{\n", self.name);

        out.push_str("    pub fn ordinal(&self) -> u64 {\n");
        out.push_str(&self.match_self(|v| format!("Self::{}(_) => {}", v.name, v.ordinal), "Self::__Unknown { ordinal, .. } => *ordinal"));
        out.push_str("    }\n\n");

        if self.flexible {
            out.push_str(&format!("    pub fn tag(&self) -> {}<{}> {{\n", OPTION, tag));
            out.push_str(&self.match_self(
                |v| format!("Self::{}(_) => Some({}::{})", v.name, tag, v.name),
                "Self::__Unknown { .. } => None",
            ));
            out.push_str("    }\n\n");
            out.push_str("    /// True for a variant this version of the schema does not know.\n");
            out.push_str("    pub fn is_unknown(&self) -> bool {\n");
            out.push_str("        matches!(self, Self::__Unknown { .. })\n");
            out.push_str("    }\n");
        } else {
            out.push_str(&format!("    pub fn tag(&self) -> {} {{\n", tag));
            out.push_str(&self.match_self(|v| format!("Self::{}(_) => {}::{}", v.name, tag, v.name), ""));
            out.push_str("    }\n");
        }
        out.push_str("}\n");
        out
    }

    /// `match self { ... }` over every variant, plus `unknown_arm` for
    /// flexible unions.
    fn match_self(&self, arm: impl Fn(&Variant) -> String, unknown_arm: &str) -> String {
        if self.variants.is_empty() && !self.flexible {
            return "        match *self {}\n".to_string();
        }
        let mut out = "        match self {\n".to_string();
        for variant in &self.variants {
            out.push_str(&format!("            {},\n", arm(variant)));
        }
        if self.flexible {
            out.push_str(&format!("            {},\n", unknown_arm));
        }
        out.push_str("        }\n");
        out
    }

    pub(crate) fn codec(&self) -> String {
        let mut out = self.methods();
        out.push('\n');
        out.push_str(&layout_impl(self.name, UNION_SHAPE));

        out.push_str(&format!("\nimpl {}::Encode for {} {{\n", RUNTIME, self.name));
        out.push_str(&encode_signature());
        if self.variants.is_empty() && !self.flexible {
            out.push_str("        match *self {}\n");
        } else {
            out.push_str("        match self {\n");
            for variant in &self.variants {
                let encode = format!("{}::encode_union(encoder, offset, {}, value)", RUNTIME, variant.ordinal);
                match variant.binding.max_len {
                    None => out.push_str(&format!("            Self::{}(value) => {},\n", variant.name, encode)),
                    Some(_) => out.push_str(&format!(
                        "            Self::{}(value) => {{\n{}                {}\n            }}\n",
                        variant.name,
                        encode_bound_check(&variant.binding, "value", "                "),
                        encode,
                    )),
                }
            }
            if self.flexible {
                out.push_str(&format!(
                    "            Self::__Unknown {{ ordinal, data }} => {}::encode_unknown_union(encoder, offset, *ordinal, data),\n",
                    RUNTIME
                ));
            }
            out.push_str("        }\n");
        }
        out.push_str("    }\n}\n");

        out.push_str(&format!("\nimpl {}::Decode for {} {{\n", RUNTIME, self.name));
        out.push_str(&decode_signature());
        out.push_str(&format!("        let header = {}::UnionHeader::decode(decoder, offset)?;\n", RUNTIME));
        out.push_str("        match header.ordinal {\n");
        for variant in &self.variants {
            let decode = format!(
                "{}::decode_envelope::<{}>(decoder, &header.envelope)?",
                RUNTIME, variant.binding.rust
            );
            out.push_str(&format!(
                "            {} => Ok(Self::{}({})),\n",
                variant.ordinal,
                variant.name,
                bounded(&variant.binding, decode),
            ));
        }
        if self.flexible {
            out.push_str(&format!(
                "            ordinal => Ok(Self::__Unknown {{ ordinal, data: {}::skip_envelope(decoder, &header.envelope)? }}),\n",
                RUNTIME
            ));
        } else {
            out.push_str(&format!(
                "            ordinal => Err({}::Error::UnknownUnionOrdinal {{ type_name: {:?}, ordinal }}),\n",
                RUNTIME, self.wire_name
            ));
        }
        out.push_str("        }\n    }\n}\n");

        out.push('\n');
        out.push_str(&boxed_impl(self.name, "Union"));
        out
    }
}
