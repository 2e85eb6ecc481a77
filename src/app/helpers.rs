use actix_web::{
  http::header,
  HttpRequest,
  HttpResponse
};
use serde::Serialize;
use std::net::IpAddr;
use std::str::FromStr;
use regex::Regex;
use lazy_static::lazy_static;

// Every JSON answer touches mutable state one way or
// another, none of it should end up in a cache.
pub fn json_no_store<T: Serialize>(body: T) -> HttpResponse {
  HttpResponse::Ok()
    .insert_header((header::CACHE_CONTROL, "no-store"))
    .json(body)
}

// Only used for logging failed logins, so not getting an
// address is fine.
pub fn real_ip_addr(req: &HttpRequest) -> Option<IpAddr> {
  // The goal of the regex is to remove the port part
  // from the "IP address" that Actix gives us, which
  // may or may not have a port part.
  lazy_static! {
    static ref PORT_REGEX: Regex = Regex::new(
      r"^\[?([^\]]+?)\]?:\d+$"
    ).unwrap();
  }

  req.connection_info().realip_remote_addr()
    .and_then(|ip| {
      // A bare IPv6 address also ends with ":digits", try
      // it as-is first.
      IpAddr::from_str(ip)
        .or_else(|_| IpAddr::from_str(&PORT_REGEX.replace(ip, "$1")))
        .ok()
    })
}
