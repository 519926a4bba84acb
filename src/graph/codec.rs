//! Frame codec for the graph service protocol.
//!
//! Every call is one request frame answered by one response frame. A frame
//! is a `u32` big-endian payload length followed by the payload; the payload
//! starts with a method tag byte. Integers are big-endian, byte-strings are
//! length-prefixed, collections are count-prefixed.

use std::collections::HashMap;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::error::{GraphError, GraphResult};
use super::value::{DataSet, Date, DateTime, Duration, Edge, NebulaValue, Path, Row, Step, Tag, Time, Vertex};

/// Method tags.
pub const METHOD_VERIFY_VERSION: u8 = 0x01;
pub const METHOD_AUTHENTICATE: u8 = 0x02;
pub const METHOD_EXECUTE: u8 = 0x03;
pub const METHOD_SIGNOUT: u8 = 0x04;

/// Frames larger than this are rejected as malformed.
const MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

// Value tags.
const TAG_EMPTY: u8 = 0x00;
const TAG_NULL: u8 = 0x01;
const TAG_BOOL: u8 = 0x02;
const TAG_INT: u8 = 0x03;
const TAG_FLOAT: u8 = 0x04;
const TAG_STR: u8 = 0x05;
const TAG_DATE: u8 = 0x06;
const TAG_TIME: u8 = 0x07;
const TAG_DATETIME: u8 = 0x08;
const TAG_LIST: u8 = 0x09;
const TAG_SET: u8 = 0x0A;
const TAG_MAP: u8 = 0x0B;
const TAG_DURATION: u8 = 0x0C;
const TAG_VERTEX: u8 = 0x0D;
const TAG_EDGE: u8 = 0x0E;
const TAG_PATH: u8 = 0x0F;
const TAG_GEOGRAPHY: u8 = 0x10;

// ============================================================================
// Request / response messages
// ============================================================================

/// Client-to-server requests.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphRequest {
    /// Protocol/version compatibility check, sent before authentication.
    VerifyVersion { version: String },
    /// Username/password authentication.
    Authenticate { username: Vec<u8>, password: Vec<u8> },
    /// Parameterized statement execution against an authenticated session.
    Execute {
        session_id: i64,
        statement: Vec<u8>,
        parameters: HashMap<Vec<u8>, NebulaValue>,
    },
    /// Session sign-out.
    Signout { session_id: i64 },
}

impl GraphRequest {
    fn method(&self) -> u8 {
        match self {
            GraphRequest::VerifyVersion { .. } => METHOD_VERIFY_VERSION,
            GraphRequest::Authenticate { .. } => METHOD_AUTHENTICATE,
            GraphRequest::Execute { .. } => METHOD_EXECUTE,
            GraphRequest::Signout { .. } => METHOD_SIGNOUT,
        }
    }
}

/// Status-only response body, shared by version check and sign-out.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatusResponse {
    pub error_code: i32,
    pub error_msg: Option<String>,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn error(code: i32, msg: impl Into<String>) -> Self {
        Self {
            error_code: code,
            error_msg: Some(msg.into()),
        }
    }
}

/// Authentication response body.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AuthResponse {
    pub error_code: i32,
    pub error_msg: Option<String>,
    pub session_id: i64,
    pub timezone_offset_seconds: i32,
}

/// Statement execution response body.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExecutionResponse {
    pub error_code: i32,
    pub error_msg: Option<String>,
    pub data: Option<DataSet>,
    pub space_name: Option<String>,
    pub latency_us: i64,
}

impl ExecutionResponse {
    pub fn is_succeeded(&self) -> bool {
        self.error_code == super::codes::SUCCEEDED
    }

    pub fn error_message(&self) -> String {
        self.error_msg.clone().unwrap_or_default()
    }
}

/// Server-to-client responses, one per request method.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphResponse {
    VerifyVersion(StatusResponse),
    Authenticate(AuthResponse),
    Execute(ExecutionResponse),
    Signout(StatusResponse),
}

// ============================================================================
// Primitive encoding
// ============================================================================

fn put_bytes(dst: &mut BytesMut, b: &[u8]) {
    dst.put_u32(b.len() as u32);
    dst.put_slice(b);
}

fn put_string(dst: &mut BytesMut, s: &str) {
    put_bytes(dst, s.as_bytes());
}

fn put_opt_string(dst: &mut BytesMut, s: &Option<String>) {
    match s {
        Some(s) => {
            dst.put_u8(1);
            put_string(dst, s);
        }
        None => dst.put_u8(0),
    }
}

fn need(src: &impl Buf, n: usize) -> GraphResult<()> {
    if src.remaining() < n {
        return Err(GraphError::Protocol(format!(
            "truncated frame: need {} more bytes, have {}",
            n,
            src.remaining()
        )));
    }
    Ok(())
}

fn get_bytes(src: &mut impl Buf) -> GraphResult<Vec<u8>> {
    need(src, 4)?;
    let len = src.get_u32() as usize;
    need(src, len)?;
    let mut buf = vec![0u8; len];
    src.copy_to_slice(&mut buf);
    Ok(buf)
}

fn get_string(src: &mut impl Buf) -> GraphResult<String> {
    let bytes = get_bytes(src)?;
    String::from_utf8(bytes).map_err(|e| GraphError::Protocol(format!("invalid UTF-8: {}", e)))
}

fn get_opt_string(src: &mut impl Buf) -> GraphResult<Option<String>> {
    need(src, 1)?;
    match src.get_u8() {
        0 => Ok(None),
        1 => Ok(Some(get_string(src)?)),
        n => Err(GraphError::Protocol(format!("invalid option flag {}", n))),
    }
}

// ============================================================================
// Value encoding
// ============================================================================

fn put_props(dst: &mut BytesMut, props: &HashMap<String, NebulaValue>) {
    dst.put_u32(props.len() as u32);
    for (k, v) in props {
        put_string(dst, k);
        put_value(dst, v);
    }
}

fn put_vertex(dst: &mut BytesMut, v: &Vertex) {
    put_value(dst, &v.vid);
    dst.put_u32(v.tags.len() as u32);
    for tag in &v.tags {
        put_string(dst, &tag.name);
        put_props(dst, &tag.props);
    }
}

/// Encode one value, tag byte first.
pub fn put_value(dst: &mut BytesMut, value: &NebulaValue) {
    match value {
        NebulaValue::Empty => dst.put_u8(TAG_EMPTY),
        NebulaValue::Null => dst.put_u8(TAG_NULL),
        NebulaValue::Bool(b) => {
            dst.put_u8(TAG_BOOL);
            dst.put_u8(u8::from(*b));
        }
        NebulaValue::Int(i) => {
            dst.put_u8(TAG_INT);
            dst.put_i64(*i);
        }
        NebulaValue::Float(f) => {
            dst.put_u8(TAG_FLOAT);
            dst.put_f64(*f);
        }
        NebulaValue::Str(s) => {
            dst.put_u8(TAG_STR);
            put_bytes(dst, s);
        }
        NebulaValue::Date(d) => {
            dst.put_u8(TAG_DATE);
            dst.put_i16(d.year);
            dst.put_i8(d.month);
            dst.put_i8(d.day);
        }
        NebulaValue::Time(t) => {
            dst.put_u8(TAG_TIME);
            dst.put_i8(t.hour);
            dst.put_i8(t.minute);
            dst.put_i8(t.sec);
            dst.put_i32(t.microsec);
        }
        NebulaValue::DateTime(dt) => {
            dst.put_u8(TAG_DATETIME);
            dst.put_i16(dt.year);
            dst.put_i8(dt.month);
            dst.put_i8(dt.day);
            dst.put_i8(dt.hour);
            dst.put_i8(dt.minute);
            dst.put_i8(dt.sec);
            dst.put_i32(dt.microsec);
        }
        NebulaValue::List(items) | NebulaValue::Set(items) => {
            dst.put_u8(if matches!(value, NebulaValue::List(_)) {
                TAG_LIST
            } else {
                TAG_SET
            });
            dst.put_u32(items.len() as u32);
            for item in items {
                put_value(dst, item);
            }
        }
        NebulaValue::Map(map) => {
            dst.put_u8(TAG_MAP);
            put_props(dst, map);
        }
        NebulaValue::Duration(d) => {
            dst.put_u8(TAG_DURATION);
            dst.put_i64(d.seconds);
            dst.put_i32(d.microseconds);
            dst.put_i8(d.months);
        }
        NebulaValue::Vertex(v) => {
            dst.put_u8(TAG_VERTEX);
            put_vertex(dst, v);
        }
        NebulaValue::Edge(e) => {
            dst.put_u8(TAG_EDGE);
            put_value(dst, &e.src);
            put_value(dst, &e.dst);
            put_string(dst, &e.name);
            dst.put_i64(e.ranking);
            put_props(dst, &e.props);
        }
        NebulaValue::Path(p) => {
            dst.put_u8(TAG_PATH);
            put_vertex(dst, &p.src);
            dst.put_u32(p.steps.len() as u32);
            for step in &p.steps {
                put_vertex(dst, &step.dst);
                put_string(dst, &step.name);
                dst.put_i64(step.ranking);
                put_props(dst, &step.props);
            }
        }
        NebulaValue::Geography(raw) => {
            dst.put_u8(TAG_GEOGRAPHY);
            put_bytes(dst, raw);
        }
    }
}

fn get_props(src: &mut impl Buf) -> GraphResult<HashMap<String, NebulaValue>> {
    need(src, 4)?;
    let count = src.get_u32() as usize;
    let mut props = HashMap::with_capacity(count);
    for _ in 0..count {
        let key = get_string(src)?;
        let value = get_value(src)?;
        props.insert(key, value);
    }
    Ok(props)
}

fn get_vertex(src: &mut impl Buf) -> GraphResult<Vertex> {
    let vid = Box::new(get_value(src)?);
    need(src, 4)?;
    let tag_count = src.get_u32() as usize;
    let mut tags = Vec::with_capacity(tag_count);
    for _ in 0..tag_count {
        let name = get_string(src)?;
        let props = get_props(src)?;
        tags.push(Tag { name, props });
    }
    Ok(Vertex { vid, tags })
}

/// Decode one value, tag byte first.
pub fn get_value(src: &mut impl Buf) -> GraphResult<NebulaValue> {
    need(src, 1)?;
    let tag = src.get_u8();
    let value = match tag {
        TAG_EMPTY => NebulaValue::Empty,
        TAG_NULL => NebulaValue::Null,
        TAG_BOOL => {
            need(src, 1)?;
            NebulaValue::Bool(src.get_u8() != 0)
        }
        TAG_INT => {
            need(src, 8)?;
            NebulaValue::Int(src.get_i64())
        }
        TAG_FLOAT => {
            need(src, 8)?;
            NebulaValue::Float(src.get_f64())
        }
        TAG_STR => NebulaValue::Str(get_bytes(src)?),
        TAG_DATE => {
            need(src, 4)?;
            NebulaValue::Date(Date {
                year: src.get_i16(),
                month: src.get_i8(),
                day: src.get_i8(),
            })
        }
        TAG_TIME => {
            need(src, 7)?;
            NebulaValue::Time(Time {
                hour: src.get_i8(),
                minute: src.get_i8(),
                sec: src.get_i8(),
                microsec: src.get_i32(),
            })
        }
        TAG_DATETIME => {
            need(src, 11)?;
            NebulaValue::DateTime(DateTime {
                year: src.get_i16(),
                month: src.get_i8(),
                day: src.get_i8(),
                hour: src.get_i8(),
                minute: src.get_i8(),
                sec: src.get_i8(),
                microsec: src.get_i32(),
            })
        }
        TAG_LIST | TAG_SET => {
            need(src, 4)?;
            let count = src.get_u32() as usize;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                items.push(get_value(src)?);
            }
            if tag == TAG_LIST {
                NebulaValue::List(items)
            } else {
                NebulaValue::Set(items)
            }
        }
        TAG_MAP => NebulaValue::Map(get_props(src)?),
        TAG_DURATION => {
            need(src, 13)?;
            NebulaValue::Duration(Duration {
                seconds: src.get_i64(),
                microseconds: src.get_i32(),
                months: src.get_i8(),
            })
        }
        TAG_VERTEX => NebulaValue::Vertex(get_vertex(src)?),
        TAG_EDGE => {
            let src_id = Box::new(get_value(src)?);
            let dst_id = Box::new(get_value(src)?);
            let name = get_string(src)?;
            need(src, 8)?;
            let ranking = src.get_i64();
            let props = get_props(src)?;
            NebulaValue::Edge(Edge {
                src: src_id,
                dst: dst_id,
                name,
                ranking,
                props,
            })
        }
        TAG_PATH => {
            let start = get_vertex(src)?;
            need(src, 4)?;
            let step_count = src.get_u32() as usize;
            let mut steps = Vec::with_capacity(step_count);
            for _ in 0..step_count {
                let dst_vertex = get_vertex(src)?;
                let name = get_string(src)?;
                need(src, 8)?;
                let ranking = src.get_i64();
                let props = get_props(src)?;
                steps.push(Step {
                    dst: dst_vertex,
                    name,
                    ranking,
                    props,
                });
            }
            NebulaValue::Path(Path { src: start, steps })
        }
        TAG_GEOGRAPHY => NebulaValue::Geography(get_bytes(src)?),
        other => {
            return Err(GraphError::Protocol(format!("unknown value tag 0x{:02X}", other)));
        }
    };
    Ok(value)
}

// ============================================================================
// Message bodies
// ============================================================================

fn put_status(dst: &mut BytesMut, status: &StatusResponse) {
    dst.put_i32(status.error_code);
    put_opt_string(dst, &status.error_msg);
}

fn get_status(src: &mut impl Buf) -> GraphResult<StatusResponse> {
    need(src, 4)?;
    Ok(StatusResponse {
        error_code: src.get_i32(),
        error_msg: get_opt_string(src)?,
    })
}

fn put_data_set(dst: &mut BytesMut, data: &DataSet) {
    dst.put_u32(data.column_names.len() as u32);
    for name in &data.column_names {
        put_string(dst, name);
    }
    dst.put_u32(data.rows.len() as u32);
    for row in &data.rows {
        dst.put_u32(row.values.len() as u32);
        for value in &row.values {
            put_value(dst, value);
        }
    }
}

fn get_data_set(src: &mut impl Buf) -> GraphResult<DataSet> {
    need(src, 4)?;
    let col_count = src.get_u32() as usize;
    let mut column_names = Vec::with_capacity(col_count);
    for _ in 0..col_count {
        column_names.push(get_string(src)?);
    }
    need(src, 4)?;
    let row_count = src.get_u32() as usize;
    let mut rows = Vec::with_capacity(row_count);
    for _ in 0..row_count {
        need(src, 4)?;
        let value_count = src.get_u32() as usize;
        let mut values = Vec::with_capacity(value_count);
        for _ in 0..value_count {
            values.push(get_value(src)?);
        }
        rows.push(Row { values });
    }
    Ok(DataSet { column_names, rows })
}

fn encode_request_body(request: &GraphRequest, dst: &mut BytesMut) {
    match request {
        GraphRequest::VerifyVersion { version } => {
            put_string(dst, version);
        }
        GraphRequest::Authenticate { username, password } => {
            put_bytes(dst, username);
            put_bytes(dst, password);
        }
        GraphRequest::Execute {
            session_id,
            statement,
            parameters,
        } => {
            dst.put_i64(*session_id);
            put_bytes(dst, statement);
            dst.put_u32(parameters.len() as u32);
            for (key, value) in parameters {
                put_bytes(dst, key);
                put_value(dst, value);
            }
        }
        GraphRequest::Signout { session_id } => {
            dst.put_i64(*session_id);
        }
    }
}

fn decode_request_body(method: u8, src: &mut impl Buf) -> GraphResult<GraphRequest> {
    match method {
        METHOD_VERIFY_VERSION => Ok(GraphRequest::VerifyVersion {
            version: get_string(src)?,
        }),
        METHOD_AUTHENTICATE => Ok(GraphRequest::Authenticate {
            username: get_bytes(src)?,
            password: get_bytes(src)?,
        }),
        METHOD_EXECUTE => {
            need(src, 8)?;
            let session_id = src.get_i64();
            let statement = get_bytes(src)?;
            need(src, 4)?;
            let count = src.get_u32() as usize;
            let mut parameters = HashMap::with_capacity(count);
            for _ in 0..count {
                let key = get_bytes(src)?;
                let value = get_value(src)?;
                parameters.insert(key, value);
            }
            Ok(GraphRequest::Execute {
                session_id,
                statement,
                parameters,
            })
        }
        METHOD_SIGNOUT => {
            need(src, 8)?;
            Ok(GraphRequest::Signout {
                session_id: src.get_i64(),
            })
        }
        other => Err(GraphError::Protocol(format!("unknown method tag 0x{:02X}", other))),
    }
}

fn encode_response_body(response: &GraphResponse, dst: &mut BytesMut) {
    match response {
        GraphResponse::VerifyVersion(status) | GraphResponse::Signout(status) => {
            put_status(dst, status);
        }
        GraphResponse::Authenticate(auth) => {
            dst.put_i32(auth.error_code);
            put_opt_string(dst, &auth.error_msg);
            dst.put_i64(auth.session_id);
            dst.put_i32(auth.timezone_offset_seconds);
        }
        GraphResponse::Execute(exec) => {
            dst.put_i32(exec.error_code);
            put_opt_string(dst, &exec.error_msg);
            match &exec.data {
                Some(data) => {
                    dst.put_u8(1);
                    put_data_set(dst, data);
                }
                None => dst.put_u8(0),
            }
            put_opt_string(dst, &exec.space_name);
            dst.put_i64(exec.latency_us);
        }
    }
}

fn response_method(response: &GraphResponse) -> u8 {
    match response {
        GraphResponse::VerifyVersion(_) => METHOD_VERIFY_VERSION,
        GraphResponse::Authenticate(_) => METHOD_AUTHENTICATE,
        GraphResponse::Execute(_) => METHOD_EXECUTE,
        GraphResponse::Signout(_) => METHOD_SIGNOUT,
    }
}

fn decode_response_body(method: u8, src: &mut impl Buf) -> GraphResult<GraphResponse> {
    match method {
        METHOD_VERIFY_VERSION => Ok(GraphResponse::VerifyVersion(get_status(src)?)),
        METHOD_AUTHENTICATE => {
            need(src, 4)?;
            let error_code = src.get_i32();
            let error_msg = get_opt_string(src)?;
            need(src, 12)?;
            Ok(GraphResponse::Authenticate(AuthResponse {
                error_code,
                error_msg,
                session_id: src.get_i64(),
                timezone_offset_seconds: src.get_i32(),
            }))
        }
        METHOD_EXECUTE => {
            need(src, 4)?;
            let error_code = src.get_i32();
            let error_msg = get_opt_string(src)?;
            need(src, 1)?;
            let data = match src.get_u8() {
                0 => None,
                1 => Some(get_data_set(src)?),
                n => {
                    return Err(GraphError::Protocol(format!("invalid option flag {}", n)));
                }
            };
            let space_name = get_opt_string(src)?;
            need(src, 8)?;
            Ok(GraphResponse::Execute(ExecutionResponse {
                error_code,
                error_msg,
                data,
                space_name,
                latency_us: src.get_i64(),
            }))
        }
        METHOD_SIGNOUT => Ok(GraphResponse::Signout(get_status(src)?)),
        other => Err(GraphError::Protocol(format!("unknown method tag 0x{:02X}", other))),
    }
}

// ============================================================================
// Framing
// ============================================================================

/// Split one complete frame payload off the buffer, or `None` if more data
/// is needed.
fn split_frame(src: &mut BytesMut) -> GraphResult<Option<Bytes>> {
    if src.len() < 4 {
        return Ok(None);
    }
    let len = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(GraphError::Protocol(format!(
            "frame of {} bytes exceeds limit of {}",
            len, MAX_FRAME_SIZE
        )));
    }
    if src.len() < 4 + len {
        src.reserve(4 + len - src.len());
        return Ok(None);
    }
    src.advance(4);
    Ok(Some(src.split_to(len).freeze()))
}

fn put_frame(dst: &mut BytesMut, method: u8, body: BytesMut) {
    dst.put_u32((body.len() + 1) as u32);
    dst.put_u8(method);
    dst.put_slice(&body);
}

/// Client-side codec: encodes requests, decodes responses.
#[derive(Debug, Default)]
pub struct GraphClientCodec;

impl Encoder<GraphRequest> for GraphClientCodec {
    type Error = GraphError;

    fn encode(&mut self, item: GraphRequest, dst: &mut BytesMut) -> GraphResult<()> {
        let mut body = BytesMut::new();
        encode_request_body(&item, &mut body);
        put_frame(dst, item.method(), body);
        Ok(())
    }
}

impl Decoder for GraphClientCodec {
    type Item = GraphResponse;
    type Error = GraphError;

    fn decode(&mut self, src: &mut BytesMut) -> GraphResult<Option<GraphResponse>> {
        let Some(payload) = split_frame(src)? else {
            return Ok(None);
        };
        let mut buf = payload;
        need(&buf, 1)?;
        let method = buf.get_u8();
        decode_response_body(method, &mut buf).map(Some)
    }
}

/// Server-side codec: decodes requests, encodes responses. Used by the
/// in-process test server.
#[derive(Debug, Default)]
pub struct GraphServerCodec;

impl Encoder<GraphResponse> for GraphServerCodec {
    type Error = GraphError;

    fn encode(&mut self, item: GraphResponse, dst: &mut BytesMut) -> GraphResult<()> {
        let mut body = BytesMut::new();
        encode_response_body(&item, &mut body);
        put_frame(dst, response_method(&item), body);
        Ok(())
    }
}

impl Decoder for GraphServerCodec {
    type Item = GraphRequest;
    type Error = GraphError;

    fn decode(&mut self, src: &mut BytesMut) -> GraphResult<Option<GraphRequest>> {
        let Some(payload) = split_frame(src)? else {
            return Ok(None);
        };
        let mut buf = payload;
        need(&buf, 1)?;
        let method = buf.get_u8();
        decode_request_body(method, &mut buf).map(Some)
    }
}
