use crate::error::{Result, SnifferError};

const HEADER_LEN: usize = 12;
const MAX_NAME_LEN: usize = 255;
const MAX_LABEL_LEN: usize = 63;
const MAX_POINTER_JUMPS: usize = 16;
/// 最小的问题记录：根域名 + 类型 + 类
const MIN_QUESTION_LEN: usize = 5;
/// 最小的资源记录：根域名 + 类型 + 类 + TTL + 数据长度
const MIN_RECORD_LEN: usize = 11;

#[derive(Debug, Clone, PartialEq)]
pub struct DnsHeader {
    pub id: u16,
    pub flags: u16,
    pub qdcount: u16,
    pub ancount: u16,
    pub nscount: u16,
    pub arcount: u16,
}

impl DnsHeader {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(SnifferError::Decode("Packet too short for DNS header".to_string()));
        }
        let word = |i: usize| u16::from_be_bytes([bytes[i], bytes[i + 1]]);
        Ok(Self {
            id: word(0),
            flags: word(2),
            qdcount: word(4),
            ancount: word(6),
            nscount: word(8),
            arcount: word(10),
        })
    }

    pub fn is_response(&self) -> bool {
        self.flags & 0x8000 != 0
    }

    pub fn opcode(&self) -> u8 {
        ((self.flags >> 11) & 0x0F) as u8
    }

    /// 保留位 Z，合法报文中必须为 0
    pub fn z(&self) -> bool {
        self.flags & 0x0040 != 0
    }

    fn record_count(&self) -> usize {
        self.ancount as usize + self.nscount as usize + self.arcount as usize
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DnsQuestion {
    pub name: String,
    pub qtype: u16,
    pub qclass: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DnsRecord {
    pub name: String,
    pub rtype: u16,
    pub rclass: u16,
    pub ttl: u32,
    pub data_len: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DnsMessage {
    pub header: DnsHeader,
    pub questions: Vec<DnsQuestion>,
    pub answers: Vec<DnsRecord>,
    /// 头部及各段共占用的字节数
    pub consumed: usize,
}

impl DnsMessage {
    /// 解析头部和全部四个段；授权段和附加段
    /// 只做校验后跳过
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let header = DnsHeader::from_bytes(bytes)?;

        let minimum = HEADER_LEN
            + header.qdcount as usize * MIN_QUESTION_LEN
            + header.record_count() * MIN_RECORD_LEN;
        if minimum > bytes.len() {
            return Err(SnifferError::Decode(format!(
                "DNS section counts need {} bytes, have {}",
                minimum,
                bytes.len()
            )));
        }

        let mut offset = HEADER_LEN;
        let mut questions = Vec::with_capacity(header.qdcount as usize);
        for _ in 0..header.qdcount {
            let (name, next) = read_name(bytes, offset)?;
            let fixed = take(bytes, next, 4)?;
            questions.push(DnsQuestion {
                name,
                qtype: u16::from_be_bytes([fixed[0], fixed[1]]),
                qclass: u16::from_be_bytes([fixed[2], fixed[3]]),
            });
            offset = next + 4;
        }

        let mut answers = Vec::with_capacity(header.ancount as usize);
        for index in 0..header.record_count() {
            let (record, next) = read_record(bytes, offset)?;
            if index < header.ancount as usize {
                answers.push(record);
            }
            offset = next;
        }

        Ok(Self {
            header,
            questions,
            answers,
            consumed: offset,
        })
    }
}

fn take(bytes: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    bytes
        .get(offset..offset + len)
        .ok_or_else(|| SnifferError::Decode(format!("DNS field truncated at offset {}", offset)))
}

fn read_record(bytes: &[u8], offset: usize) -> Result<(DnsRecord, usize)> {
    let (name, next) = read_name(bytes, offset)?;
    let fixed = take(bytes, next, 10)?;
    let data_len = u16::from_be_bytes([fixed[8], fixed[9]]);
    let data_start = next + 10;
    take(bytes, data_start, data_len as usize)?;

    let record = DnsRecord {
        name,
        rtype: u16::from_be_bytes([fixed[0], fixed[1]]),
        rclass: u16::from_be_bytes([fixed[2], fixed[3]]),
        ttl: u32::from_be_bytes([fixed[4], fixed[5], fixed[6], fixed[7]]),
        data_len,
    };
    Ok((record, data_start + data_len as usize))
}

/// 从 `offset` 处读取域名（可能经过压缩）
/// 返回点分形式的域名，以及原始报文中紧随其后的偏移
pub fn read_name(bytes: &[u8], offset: usize) -> Result<(String, usize)> {
    let mut labels: Vec<String> = Vec::new();
    let mut position = offset;
    let mut resume_at = None;
    let mut jumps = 0;
    let mut name_len = 0;

    loop {
        let len = *bytes
            .get(position)
            .ok_or_else(|| SnifferError::Decode("DNS name runs past end of message".to_string()))?;

        match len & 0xC0 {
            0x00 => {
                if len == 0 {
                    position += 1;
                    break;
                }
                let len = len as usize;
                if len > MAX_LABEL_LEN {
                    return Err(SnifferError::Decode(format!("DNS label too long: {}", len)));
                }
                let label = take(bytes, position + 1, len)?;
                name_len += len + 1;
                if name_len > MAX_NAME_LEN {
                    return Err(SnifferError::Decode("DNS name too long".to_string()));
                }
                labels.push(String::from_utf8_lossy(label).into_owned());
                position += len + 1;
            }
            0xC0 => {
                let low = *bytes
                    .get(position + 1)
                    .ok_or_else(|| SnifferError::Decode("DNS pointer truncated".to_string()))?;
                jumps += 1;
                if jumps > MAX_POINTER_JUMPS {
                    return Err(SnifferError::Decode("DNS compression loop".to_string()));
                }
                if resume_at.is_none() {
                    resume_at = Some(position + 2);
                }
                position = (((len & 0x3F) as usize) << 8) | low as usize;
            }
            _ => {
                return Err(SnifferError::Decode(format!(
                    "Unsupported DNS label type 0x{:02x}",
                    len
                )))
            }
        }
    }

    let name = if labels.is_empty() {
        ".".to_string()
    } else {
        labels.join(".")
    };
    Ok((name, resume_at.unwrap_or(position)))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// 构造对 `name` 的标准递归 A 记录查询
    pub(crate) fn build_query(id: u16, name: &str) -> Vec<u8> {
        let mut msg = Vec::new();
        msg.extend_from_slice(&id.to_be_bytes());
        msg.extend_from_slice(&0x0100u16.to_be_bytes());
        msg.extend_from_slice(&[0, 1, 0, 0, 0, 0, 0, 0]);
        for label in name.split('.') {
            msg.push(label.len() as u8);
            msg.extend_from_slice(label.as_bytes());
        }
        msg.push(0);
        msg.extend_from_slice(&[0, 1, 0, 1]);
        msg
    }

    /// `build_query` 的应答，带一条压缩的 A 记录
    pub(crate) fn build_response(id: u16, name: &str, addr: [u8; 4]) -> Vec<u8> {
        let mut msg = build_query(id, name);
        msg[2] = 0x81;
        msg[3] = 0x80;
        msg[7] = 1;
        msg.extend_from_slice(&[0xC0, 0x0C, 0, 1, 0, 1, 0, 0, 0x0E, 0x10, 0, 4]);
        msg.extend_from_slice(&addr);
        msg
    }

    #[test]
    fn test_parse_query() {
        let bytes = build_query(0x1234, "example.com");
        let msg = DnsMessage::parse(&bytes).unwrap();

        assert_eq!(msg.header.id, 0x1234);
        assert!(!msg.header.is_response());
        assert_eq!(msg.header.opcode(), 0);
        assert_eq!(msg.questions.len(), 1);
        assert_eq!(msg.questions[0].name, "example.com");
        assert_eq!(msg.questions[0].qtype, 1);
        assert_eq!(msg.consumed, bytes.len());
    }

    #[test]
    fn test_parse_response_with_compression() {
        let bytes = build_response(7, "www.example.org", [93, 184, 216, 34]);
        let msg = DnsMessage::parse(&bytes).unwrap();

        assert!(msg.header.is_response());
        assert_eq!(msg.answers.len(), 1);
        assert_eq!(msg.answers[0].name, "www.example.org");
        assert_eq!(msg.answers[0].ttl, 3600);
        assert_eq!(msg.answers[0].data_len, 4);
        assert_eq!(msg.consumed, bytes.len());
    }

    #[test]
    fn test_rejects_short_header() {
        assert!(DnsHeader::from_bytes(&[0u8; 11]).is_err());
        assert!(DnsMessage::parse(&[]).is_err());
    }

    #[test]
    fn test_rejects_inflated_counts() {
        let mut bytes = build_query(1, "example.com");
        bytes[4] = 0xFF;
        assert!(DnsMessage::parse(&bytes).is_err());
    }

    #[test]
    fn test_pointer_loop_is_an_error() {
        // 偏移 12 处的名字指向自身
        let mut bytes = vec![0u8; 12];
        bytes[5] = 1;
        bytes.extend_from_slice(&[0xC0, 0x0C, 0, 1, 0, 1]);
        assert!(DnsMessage::parse(&bytes).is_err());
    }

    #[test]
    fn test_root_name() {
        let (name, next) = read_name(&[0], 0).unwrap();
        assert_eq!(name, ".");
        assert_eq!(next, 1);
    }
}
