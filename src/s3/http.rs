// Turbine Rust Library for Amazon S3 Compatible Cloud Storage
// Copyright 2024 MinIO, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::s3::error::Error;
use crate::s3::multimap_ext::{Multimap, MultimapExt};
use crate::s3::utils::{match_hostname, urlencode_object_key};
use hyper::Uri;
use std::fmt;
use std::str::FromStr;

/// Represents a fully built HTTP URL for one request
#[derive(Clone, Debug)]
pub struct Url {
    pub https: bool,
    pub host: String,
    pub port: u16,
    pub path: String,
    pub query: Multimap,
}

impl Url {
    /// Value for the Host header; includes the port only when non-default.
    pub fn host_header_value(&self) -> String {
        if self.port > 0 {
            return format!("{}:{}", self.host, self.port);
        }
        self.host.clone()
    }
}

impl Default for Url {
    fn default() -> Self {
        Self {
            https: true,
            host: String::default(),
            port: u16::default(),
            path: String::from("/"),
            query: Multimap::default(),
        }
    }
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.host.is_empty() {
            return Err(std::fmt::Error);
        }

        if self.https {
            f.write_str("https://")?;
        } else {
            f.write_str("http://")?;
        }

        f.write_str(&self.host_header_value())?;

        if !self.path.starts_with('/') {
            f.write_str("/")?;
        }
        f.write_str(&self.path)?;

        if !self.query.is_empty() {
            f.write_str("?")?;
            f.write_str(&self.query.to_query_string())?;
        }

        Ok(())
    }
}

/// Represents the base URL of an S3 compatible endpoint
#[derive(Clone, Debug)]
pub struct BaseUrl {
    pub https: bool,
    host: String,
    port: u16,
    pub region: String,
    pub virtual_style: bool,
}

impl Default for BaseUrl {
    fn default() -> Self {
        Self {
            https: true,
            host: "127.0.0.1".to_string(),
            port: 9000,
            region: String::new(),
            virtual_style: false,
        }
    }
}

impl FromStr for BaseUrl {
    type Err = Error;

    /// Convert a string to a BaseUrl.
    ///
    /// # Examples
    ///
    /// ```
    /// use s3_turbine::s3::http::BaseUrl;
    /// use std::str::FromStr;
    ///
    /// let base_url = "play.min.io".parse::<BaseUrl>().unwrap();
    /// let base_url: BaseUrl = "http://192.168.124.63:9000".parse().unwrap();
    /// ```
    fn from_str(s: &str) -> Result<Self, Error> {
        let url = s.parse::<Uri>()?;

        let https = match url.scheme() {
            None => true,
            Some(scheme) => match scheme.as_str() {
                "http" => false,
                "https" => true,
                _ => {
                    return Err(Error::InvalidBaseUrl(
                        "scheme must be http or https".into(),
                    ));
                }
            },
        };

        let host = match url.host() {
            Some(h) => h,
            _ => {
                return Err(Error::InvalidBaseUrl(
                    "valid host must be provided".into(),
                ));
            }
        };

        let mut port = match url.port() {
            Some(p) => p.as_u16(),
            _ => 0u16,
        };

        if (https && port == 443) || (!https && port == 80) {
            port = 0u16;
        }

        if url.path() != "/" && !url.path().is_empty() {
            return Err(Error::InvalidBaseUrl(
                "path must be empty for base URL".into(),
            ));
        }

        if url.query().is_some() {
            return Err(Error::InvalidBaseUrl(
                "query must be none for base URL".into(),
            ));
        }

        // Virtual-hosted style is the norm for the big AWS-compatible
        // domains; everything else defaults to path style.
        let virtual_style =
            host.ends_with(".amazonaws.com") || host.ends_with(".amazonaws.com.cn");

        Ok(BaseUrl {
            https,
            host: host.to_string(),
            port,
            region: String::new(),
            virtual_style,
        })
    }
}

impl BaseUrl {
    /// Host name of the endpoint, without bucket decoration.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Builds the URL for one S3 operation on a bucket/object.
    pub fn build_url(
        &self,
        query: &Multimap,
        bucket_name: &str,
        object_name: Option<&str>,
    ) -> Result<Url, Error> {
        if !match_hostname(&self.host) && self.host.parse::<std::net::IpAddr>().is_err() {
            return Err(Error::UrlBuildError(format!(
                "invalid host {}",
                self.host
            )));
        }

        let mut url = Url {
            https: self.https,
            host: self.host.clone(),
            port: self.port,
            path: String::from("/"),
            query: query.clone(),
        };

        // Bucket names containing dots break TLS wildcard certificates, so
        // those stay on path style even for virtual-style endpoints.
        let mut path = String::new();
        if self.virtual_style && !(bucket_name.contains('.') && self.https) {
            url.host = format!("{}.{}", bucket_name, url.host);
        } else {
            path.push('/');
            path.push_str(bucket_name);
        }

        if let Some(v) = object_name {
            if !v.starts_with('/') {
                path.push('/');
            }
            path.push_str(&urlencode_object_key(v));
        }

        if path.is_empty() {
            path.push('/');
        }
        url.path = path;

        Ok(url)
    }
}
