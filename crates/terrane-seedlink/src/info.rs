//! Parsed `INFO` response documents.
//!
//! SeedLink INFO responses are XML wrapped in ASCII miniSEED records. The
//! client only needs the pieces it acts on: server identity, declared
//! capabilities, and the station/stream listing.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::SeedLinkError;

/// One `<seedlink>` INFO document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Info {
    pub software: String,
    pub organization: String,
    pub started: String,
    /// `<capability name="..."/>` entries.
    pub capabilities: Vec<String>,
    /// `<station>` entries from INFO STATIONS / STREAMS.
    pub stations: Vec<StationInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StationInfo {
    pub name: String,
    pub network: String,
    pub description: String,
    /// `<stream>` entries, present for INFO STREAMS.
    pub streams: Vec<StreamInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamInfo {
    pub location: String,
    pub seedname: String,
    pub kind: String,
}

fn attr(element: &BytesStart<'_>, name: &[u8]) -> String {
    element
        .attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name)
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.into_owned())
        .unwrap_or_default()
}

impl Info {
    /// Parse a concatenated INFO payload. Trailing NUL padding from the
    /// record data regions is tolerated.
    pub fn parse(data: &[u8]) -> Result<Info, SeedLinkError> {
        let text = String::from_utf8_lossy(data);
        let text = text.trim_end_matches('\0');

        let mut reader = Reader::from_str(text);
        reader.trim_text(true);

        let mut info = Info::default();
        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.name().as_ref() {
                    b"seedlink" => {
                        info.software = attr(&e, b"software");
                        info.organization = attr(&e, b"organization");
                        info.started = attr(&e, b"started");
                    }
                    b"capability" => info.capabilities.push(attr(&e, b"name")),
                    b"station" => info.stations.push(StationInfo {
                        name: attr(&e, b"name"),
                        network: attr(&e, b"network"),
                        description: attr(&e, b"description"),
                        streams: Vec::new(),
                    }),
                    b"stream" => {
                        let stream = StreamInfo {
                            location: attr(&e, b"location"),
                            seedname: attr(&e, b"seedname"),
                            kind: attr(&e, b"type"),
                        };
                        if let Some(station) = info.stations.last_mut() {
                            station.streams.push(stream);
                        }
                    }
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(err) => {
                    return Err(SeedLinkError::Protocol(format!("info xml: {err}")));
                }
            }
        }

        Ok(info)
    }
}
