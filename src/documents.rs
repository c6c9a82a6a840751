//! Input document rendering
//!
//! Turns a generation plan into the XML text handed to the transform engine.
//! Scalar rules are executed through the [`ValueGenerator`] in the plan's
//! traversal order (attributes before content, the element tree before
//! extension functions and stylesheet parameters), so the ledger lines up
//! with the plan.

use indexmap::IndexMap;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Write;

use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::namespaces::QName;
use crate::request::{AddElementRule, ContentRule, GenerationRule, RawContentMode, Request};
use crate::schema::XsltSchema;
use crate::values::{TaintMarker, ValueConfig, ValueGenerator, ValueLedger};

/// One materialized test case
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    /// XML input document
    pub xml: String,
    /// Values for the stylesheet parameters
    pub parameters: IndexMap<QName, String>,
    /// Results the extension functions should return
    pub function_results: IndexMap<QName, String>,
    /// Provenance of every value in the document
    pub ledger: ValueLedger,
}

/// Renders plans against one schema
#[derive(Debug, Clone)]
pub struct DocumentRenderer<'s> {
    schema: &'s XsltSchema,
    marker: TaintMarker,
    values: ValueConfig,
    limits: Limits,
}

impl<'s> DocumentRenderer<'s> {
    /// Create a renderer
    pub fn new(schema: &'s XsltSchema, marker: TaintMarker) -> Self {
        Self {
            schema,
            marker,
            values: ValueConfig::default(),
            limits: Limits::default(),
        }
    }

    /// Set the value generator configuration
    pub fn with_value_config(mut self, values: ValueConfig) -> Self {
        self.values = values;
        self
    }

    /// Set the limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Render a plan with a fresh value ledger
    pub fn render(&self, request: &Request) -> Result<RenderedDocument> {
        if request.stylesheet_uri() != self.schema.stylesheet_uri()
            || request.schema_version() != self.schema.version()
        {
            return Err(Error::Schema(format!(
                "Request for {} v{} rendered against schema {} v{}",
                request.stylesheet_uri(),
                request.schema_version(),
                self.schema.stylesheet_uri(),
                self.schema.version()
            )));
        }

        let mut values = ValueGenerator::new(
            self.schema,
            self.marker.clone(),
            self.values.clone(),
            request.value_seed(),
        );
        let mut writer = Writer::new(Vec::new());
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        self.write_element(&mut writer, &mut values, request.root())?;

        let mut function_results = IndexMap::new();
        for rule in request.extension_functions() {
            let function = self.schema.extension_function(rule.target())?;
            function_results.insert(function.name.clone(), values.generate_value(rule)?);
        }

        let mut parameters = IndexMap::new();
        for rule in request.stylesheet_parameters() {
            let parameter = self.schema.stylesheet_parameter(rule.target())?;
            parameters.insert(parameter.name.clone(), values.generate_value(rule)?);
        }

        let xml = String::from_utf8(writer.into_inner())
            .map_err(|e| Error::Xml(format!("Rendered document is not UTF-8: {}", e)))?;
        self.limits.check_document_size(xml.len())?;

        Ok(RenderedDocument {
            xml,
            parameters,
            function_results,
            ledger: values.into_ledger(),
        })
    }

    fn write_element(
        &self,
        writer: &mut Writer<Vec<u8>>,
        values: &mut ValueGenerator<'_>,
        rule: &AddElementRule,
    ) -> Result<()> {
        let reference = self.schema.element_reference(rule.target())?;
        let mut start = BytesStart::new(reference.name.as_str());
        for attribute_rule in rule.attributes() {
            let attribute = self.schema.attribute(attribute_rule.target())?;
            let value = values.generate_value(attribute_rule)?;
            start.push_attribute((attribute.name.as_str(), value.as_str()));
        }

        if rule.content().is_empty() {
            writer.write_event(Event::Empty(start))?;
            return Ok(());
        }

        writer.write_event(Event::Start(start))?;
        for content in rule.content() {
            match content {
                ContentRule::Element(child) => self.write_element(writer, values, child)?,
                ContentRule::Data(data) => {
                    let value = values.generate_value(data)?;
                    writer.write_event(Event::Text(BytesText::new(&value)))?;
                }
                ContentRule::Raw(raw) => {
                    let value = values.generate_value(raw)?;
                    match raw.mode() {
                        // Well-formed by construction or by the requested value check
                        RawContentMode::Full => writer.get_mut().write_all(value.as_bytes())?,
                        RawContentMode::Restricted => {
                            writer.write_event(Event::Text(BytesText::new(&value)))?
                        }
                    }
                }
            }
        }
        writer.write_event(Event::End(BytesEnd::new(reference.name.as_str())))?;
        Ok(())
    }
}
