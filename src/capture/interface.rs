use std::fmt;

use pcap::Device;

use crate::error::Result;

/// libpcap 报告的可抓包接口
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceInfo {
    pub name: String,
    pub description: Option<String>,
    /// `addr/netmask` 形式的地址
    pub addresses: Vec<String>,
}

impl From<Device> for InterfaceInfo {
    fn from(device: Device) -> Self {
        let addresses = device
            .addresses
            .iter()
            .map(|address| match address.netmask {
                Some(mask) => format!("{}/{}", address.addr, mask),
                None => address.addr.to_string(),
            })
            .collect();

        Self {
            name: device.name,
            description: device.desc,
            addresses,
        }
    }
}

impl fmt::Display for InterfaceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let description = self
            .description
            .as_deref()
            .filter(|d| !d.is_empty())
            .unwrap_or("no description");
        write!(f, "{}: {}", self.name, description)?;
        for address in &self.addresses {
            write!(f, " [IP: {}]", address)?;
        }
        Ok(())
    }
}

pub fn list_interfaces() -> Result<Vec<InterfaceInfo>> {
    Ok(Device::list()?.into_iter().map(InterfaceInfo::from).collect())
}

/// 按名称查找设备
pub(crate) fn find_device(name: &str) -> Result<Option<Device>> {
    Ok(Device::list()?.into_iter().find(|dev| dev.name == name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_with_addresses() {
        let info = InterfaceInfo {
            name: "eth0".to_string(),
            description: Some("Ethernet adapter".to_string()),
            addresses: vec!["192.168.1.10/255.255.255.0".to_string()],
        };
        assert_eq!(
            info.to_string(),
            "eth0: Ethernet adapter [IP: 192.168.1.10/255.255.255.0]"
        );
    }

    #[test]
    fn test_display_without_description() {
        let info = InterfaceInfo {
            name: "lo".to_string(),
            description: None,
            addresses: vec![],
        };
        assert_eq!(info.to_string(), "lo: no description");
    }
}
