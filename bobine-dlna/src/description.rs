//! UPnP device and service description documents.

use crate::didl::escape_xml;

/// Root device description served at `/dlna/device.xml`.
#[must_use]
pub fn device_description(udn: &str, friendly_name: &str, base_url: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<root xmlns="urn:schemas-upnp-org:device-1-0">
  <specVersion><major>1</major><minor>0</minor></specVersion>
  <device>
    <deviceType>urn:schemas-upnp-org:device:MediaServer:1</deviceType>
    <friendlyName>{name}</friendlyName>
    <manufacturer>Bobine</manufacturer>
    <modelName>Bobine Media Server</modelName>
    <modelNumber>1.0</modelNumber>
    <UDN>{udn}</UDN>
    <presentationURL>{base}/</presentationURL>
    <serviceList>
      <service>
        <serviceType>urn:schemas-upnp-org:service:ContentDirectory:1</serviceType>
        <serviceId>urn:upnp-org:serviceId:ContentDirectory</serviceId>
        <SCPDURL>/dlna/cds.xml</SCPDURL>
        <controlURL>/dlna/control/ContentDirectory</controlURL>
        <eventSubURL>/dlna/events/ContentDirectory</eventSubURL>
      </service>
      <service>
        <serviceType>urn:schemas-upnp-org:service:ConnectionManager:1</serviceType>
        <serviceId>urn:upnp-org:serviceId:ConnectionManager</serviceId>
        <SCPDURL>/dlna/cms.xml</SCPDURL>
        <controlURL>/dlna/control/ConnectionManager</controlURL>
        <eventSubURL>/dlna/events/ConnectionManager</eventSubURL>
      </service>
    </serviceList>
  </device>
</root>
"#,
        name = escape_xml(friendly_name),
        udn = escape_xml(udn),
        base = escape_xml(base_url),
    )
}

/// Minimal ContentDirectory SCPD.
#[must_use]
pub fn content_directory_scpd() -> &'static str {
    r#"<?xml version="1.0" encoding="utf-8"?>
<scpd xmlns="urn:schemas-upnp-org:service-1-0">
  <specVersion><major>1</major><minor>0</minor></specVersion>
  <actionList>
    <action><name>Browse</name></action>
    <action><name>Search</name></action>
    <action><name>GetSystemUpdateID</name></action>
  </actionList>
</scpd>
"#
}

/// Minimal ConnectionManager SCPD.
#[must_use]
pub fn connection_manager_scpd() -> &'static str {
    r#"<?xml version="1.0" encoding="utf-8"?>
<scpd xmlns="urn:schemas-upnp-org:service-1-0">
  <specVersion><major>1</major><minor>0</minor></specVersion>
  <actionList>
    <action><name>GetProtocolInfo</name></action>
    <action><name>GetCurrentConnectionIDs</name></action>
    <action><name>GetCurrentConnectionInfo</name></action>
  </actionList>
</scpd>
"#
}
