// Copyright Yuzu Contributors (https://github.com/yuzu-rs)
// SPDX-License-Identifier: Apache-2.0

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;
use url::Url;

use crate::args::ArgValue;
use crate::convert::{ConverterFactory, ConverterRegistry};
use crate::descriptor::{MethodTemplate, ServiceDescriptor, TemplateCache};
use crate::errors::{ConfigError, ConversionError, HttpError};
use crate::interceptor::{dispatch, Interceptor};
use crate::request::Request;
use crate::response::Response;
use crate::transport::{TcpTransport, Transport, TransportConfig};

/// Entry point of the runtime. Holds the registered services, the compiled
/// template cache, the interceptor list and the transport. Cheap to share:
/// wrap in an `Arc` and invoke from any thread.
pub struct Client {
    base_url: String,
    services: HashMap<String, ServiceDescriptor>,
    interceptors: Vec<Arc<dyn Interceptor>>,
    transport: Arc<dyn Transport>,
    converters: ConverterRegistry,
    cache: TemplateCache,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl Client {
    pub fn builder(base_url: impl Into<String>) -> ClientBuilder {
        ClientBuilder {
            base_url: base_url.into(),
            services: Vec::new(),
            interceptors: Vec::new(),
            converter_factories: Vec::new(),
            transport: None,
            transport_config: TransportConfig::default(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Compiles (or fetches from cache) the method template, builds the
    /// request and runs it through the chain. A status outside 2xx is an
    /// error carrying the code and URL.
    pub fn invoke(
        &self,
        service: &str,
        method: &str,
        args: Vec<ArgValue>,
    ) -> Result<Response, HttpError> {
        self.invoke_inner(service, method, args).map(|(_, r)| r)
    }

    /// `invoke` plus a typed response conversion through the converter
    /// registry, resolved by the requested type.
    pub fn invoke_as<R: Send + 'static>(
        &self,
        service: &str,
        method: &str,
        args: Vec<ArgValue>,
    ) -> Result<R, HttpError> {
        let (template, response) = self.invoke_inner(service, method, args)?;
        let qualified = template.qualified_name();
        let converter = self.converters.response_converter(
            TypeId::of::<R>(),
            std::any::type_name::<R>(),
            &qualified,
        )?;
        let value = converter
            .convert(response.into_body())
            .map_err(|message| ConversionError::Failed {
                method: qualified.clone(),
                message,
            })?;
        value
            .downcast::<R>()
            .map(|boxed| *boxed)
            .map_err(|_| {
                ConversionError::TypeMismatch {
                    method: qualified,
                    type_name: std::any::type_name::<R>().to_string(),
                }
                .into()
            })
    }

    /// Runs a pre-built request through the chain, bypassing descriptors.
    pub fn execute(&self, request: Request) -> Result<Response, HttpError> {
        dispatch(&self.interceptors, self.transport.as_ref(), request)
    }

    fn invoke_inner(
        &self,
        service: &str,
        method: &str,
        args: Vec<ArgValue>,
    ) -> Result<(Arc<MethodTemplate>, Response), HttpError> {
        let descriptor = self
            .services
            .get(service)
            .ok_or_else(|| ConfigError::UnknownService {
                service: service.to_string(),
            })?;
        let template = self.cache.obtain(descriptor, method)?;
        let request = template.build_request(&self.base_url, args, &self.converters)?;
        debug!(method = %template.qualified_name(), url = request.url(), "invoking");
        let response = self.execute(request)?;
        if !response.is_success() {
            return Err(HttpError::Code {
                code: response.code(),
                url: response.request().url().to_string(),
            });
        }
        Ok((template, response))
    }
}

pub struct ClientBuilder {
    base_url: String,
    services: Vec<ServiceDescriptor>,
    interceptors: Vec<Arc<dyn Interceptor>>,
    converter_factories: Vec<Arc<dyn ConverterFactory>>,
    transport: Option<Arc<dyn Transport>>,
    transport_config: TransportConfig,
}

impl ClientBuilder {
    pub fn service(mut self, service: ServiceDescriptor) -> Self {
        self.services.push(service);
        self
    }

    /// Appends an interceptor; declaration order is execution order, the
    /// transport always runs last.
    pub fn interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn converter_factory(mut self, factory: Arc<dyn ConverterFactory>) -> Self {
        self.converter_factories.push(factory);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn transport_config(mut self, config: TransportConfig) -> Self {
        self.transport_config = config;
        self
    }

    pub fn build(self) -> Result<Client, ConfigError> {
        let parsed = Url::parse(&self.base_url)
            .map_err(|_| ConfigError::InvalidBaseUrl(self.base_url.clone()))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(ConfigError::InvalidBaseUrl(self.base_url));
        }
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(TcpTransport::new(self.transport_config)));
        let services = self
            .services
            .into_iter()
            .map(|s| (s.name().to_string(), s))
            .collect();
        Ok(Client {
            base_url: self.base_url,
            services,
            interceptors: self.interceptors,
            transport,
            converters: ConverterRegistry::new(self.converter_factories),
            cache: TemplateCache::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{MethodDescriptor, ParamSpec};
    use crate::method::HttpMethod;
    use crate::response::ResponseBody;

    struct StubTransport;

    impl Transport for StubTransport {
        fn execute(&self, request: &Request) -> Result<Response, HttpError> {
            let code = if request.url().contains("missing") {
                404
            } else {
                200
            };
            Ok(Response::builder(request.clone(), code)
                .body(ResponseBody::new(None, &b"{\"ok\":true}"[..]))
                .build())
        }
    }

    fn client() -> Client {
        Client::builder("http://host/api")
            .service(
                ServiceDescriptor::new("Api")
                    .method(
                        MethodDescriptor::new("fetch", HttpMethod::Get, "data/{id}.json")
                            .param(ParamSpec::Path {
                                name: "id".into(),
                                encoded: false,
                            })
                            .param(ParamSpec::Field {
                                name: "t".into(),
                                encoded: false,
                            }),
                    )
                    .method(MethodDescriptor::new("missing", HttpMethod::Get, "missing")),
            )
            .transport(Arc::new(StubTransport))
            .build()
            .unwrap()
    }

    #[test]
    fn invoke_assembles_url_and_returns_response() {
        let response = client()
            .invoke("Api", "fetch", vec!["101".into(), 1000.into()])
            .unwrap();
        assert_eq!(
            response.request().url(),
            "http://host/api/data/101.json?t=1000"
        );
        assert_eq!(response.body().text(), "{\"ok\":true}");
    }

    #[test]
    fn invoke_as_converts_the_body() {
        let text: String = client()
            .invoke_as("Api", "fetch", vec!["101".into(), 1000.into()])
            .unwrap();
        assert_eq!(text, "{\"ok\":true}");
    }

    #[test]
    fn non_success_status_becomes_a_code_error() {
        let err = client().invoke("Api", "missing", vec![]).unwrap_err();
        assert!(matches!(err, HttpError::Code { code: 404, .. }));
    }

    #[test]
    fn unknown_service_is_rejected() {
        let err = client().invoke("Nope", "fetch", vec![]).unwrap_err();
        assert!(matches!(
            err,
            HttpError::Config(ConfigError::UnknownService { .. })
        ));
    }

    #[test]
    fn builder_validates_the_base_url() {
        assert!(matches!(
            Client::builder("ftp://host").build().unwrap_err(),
            ConfigError::InvalidBaseUrl(_)
        ));
        assert!(matches!(
            Client::builder("not a url").build().unwrap_err(),
            ConfigError::InvalidBaseUrl(_)
        ));
        assert!(Client::builder("https://host").build().is_ok());
    }
}
