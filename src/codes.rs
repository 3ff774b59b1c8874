//! 3270 protocol constants and codes
//!
//! Command codes, order codes, AID (Attention Identifier) keys, WCC bits,
//! structured field ids and the TN3270E header vocabulary, as specified in
//! the IBM 3270 Data Stream Programmer's Reference (GA23-0059) and RFC 2355.

/// 3270 Command Codes
///
/// These are the primary commands sent from the host to the terminal.
pub const CMD_WRITE: u8 = 0xF1;                  // Write command
pub const CMD_ERASE_WRITE: u8 = 0xF5;            // Erase/Write command
pub const CMD_ERASE_WRITE_ALTERNATE: u8 = 0x7E;  // Erase/Write Alternate
pub const CMD_READ_BUFFER: u8 = 0xF2;            // Read Buffer command
pub const CMD_READ_MODIFIED: u8 = 0xF6;          // Read Modified command
pub const CMD_READ_MODIFIED_ALL: u8 = 0x6E;      // Read Modified All command
pub const CMD_ERASE_ALL_UNPROTECTED: u8 = 0x6F;  // Erase All Unprotected
pub const CMD_WRITE_STRUCTURED_FIELD: u8 = 0xF3; // Write Structured Field

/// 3270 Order Codes
/// These are embedded in the data stream to control formatting.
pub const ORDER_SF: u8 = 0x1D;  // Start Field
pub const ORDER_SFE: u8 = 0x29; // Start Field Extended
pub const ORDER_SBA: u8 = 0x11; // Set Buffer Address
pub const ORDER_SA: u8 = 0x28;  // Set Attribute
pub const ORDER_MF: u8 = 0x2C;  // Modify Field
pub const ORDER_IC: u8 = 0x13;  // Insert Cursor
pub const ORDER_PT: u8 = 0x05;  // Program Tab
pub const ORDER_RA: u8 = 0x3C;  // Repeat to Address
pub const ORDER_EUA: u8 = 0x12; // Erase Unprotected to Address
pub const ORDER_GE: u8 = 0x08;  // Graphic Escape

/// Control bytes preserved literally in the cell plane.
pub const CTRL_NUL: u8 = 0x00;
pub const CTRL_SUB: u8 = 0x3F;
pub const CTRL_DUP: u8 = 0x1C;
pub const CTRL_FM: u8 = 0x1E;
pub const CTRL_EOA: u8 = 0x0D; // terminates inbound submissions

/// Start-of-header marker inside 3270/SCS streams; introduces a status byte.
pub const CTRL_SOH: u8 = 0x01;

/// Inline structured-field marker (also the record lead byte after WSF).
pub const STRUCTURED_FIELD: u8 = 0x3C;

/// Write Control Character (WCC) bits
/// Bit layout (MSB first): reserved(2) | reset_partition | start_printer |
/// sound_alarm | keyboard_restore | reset_mdt | parity.
pub const WCC_RESET_PARTITION: u8 = 0x20;
pub const WCC_START_PRINTER: u8 = 0x10;
pub const WCC_ALARM: u8 = 0x08;
pub const WCC_RESTORE: u8 = 0x04;
pub const WCC_RESET_MDT: u8 = 0x02;

/// AID (Attention Identifier) keys
/// Sent from terminal to host to identify which key was pressed.
pub const AID_NO_AID: u8 = 0x60;
pub const AID_STRUCTURED_FIELD: u8 = 0x88;
pub const AID_READ_PARTITION: u8 = 0x61;

pub const AID_PF1: u8 = 0xF1;
pub const AID_PF2: u8 = 0xF2;
pub const AID_PF3: u8 = 0xF3;
pub const AID_PF4: u8 = 0xF4;
pub const AID_PF5: u8 = 0xF5;
pub const AID_PF6: u8 = 0xF6;
pub const AID_PF7: u8 = 0xF7;
pub const AID_PF8: u8 = 0xF8;
pub const AID_PF9: u8 = 0xF9;
pub const AID_PF10: u8 = 0x7A;
pub const AID_PF11: u8 = 0x7B;
pub const AID_PF12: u8 = 0x7C;
pub const AID_PF13: u8 = 0xC1;
pub const AID_PF14: u8 = 0xC2;
pub const AID_PF15: u8 = 0xC3;
pub const AID_PF16: u8 = 0xC4;
pub const AID_PF17: u8 = 0xC5;
pub const AID_PF18: u8 = 0xC6;
pub const AID_PF19: u8 = 0xC7;
pub const AID_PF20: u8 = 0xC8;
pub const AID_PF21: u8 = 0xC9;
pub const AID_PF22: u8 = 0x4A;
pub const AID_PF23: u8 = 0x4B;
pub const AID_PF24: u8 = 0x4C;

pub const AID_PA1: u8 = 0x6C;
pub const AID_PA2: u8 = 0x6B;
pub const AID_PA3: u8 = 0x6A;

pub const AID_CLEAR: u8 = 0x6D;
pub const AID_ENTER: u8 = 0x7D;
pub const AID_SYSREQ: u8 = 0xF0;

/// Partition ids used in inbound read requests
pub const RM_READ_PARTITION_ID: u8 = 0xF1; // read-modified-all target
pub const RM_DEFAULT_PARTITION: u8 = 0xF0; // implicit partition 0

/// Field attribute byte bits (SF order)
pub const ATTR_PROTECTED: u8 = 0x20; // Bit 5: Protected field
pub const ATTR_NUMERIC: u8 = 0x10;   // Bit 4: Numeric field
pub const ATTR_DISPLAY: u8 = 0x0C;   // Bits 2-3: Display attributes
pub const ATTR_RESERVED: u8 = 0x02;  // Bit 1: Reserved
pub const ATTR_MDT: u8 = 0x01;       // Bit 0: Modified Data Tag

/// Display attribute values (bits 2-3 of field attribute)
pub const DISPLAY_NORMAL: u8 = 0x00;
pub const DISPLAY_INTENSIFIED: u8 = 0x08;
pub const DISPLAY_HIDDEN: u8 = 0x0C;

/// Extended field attribute types (SFE/SA/MF orders)
pub const XA_ALL: u8 = 0x00;
pub const XA_3270: u8 = 0xC0;
pub const XA_VALIDATION: u8 = 0xC1;
pub const XA_OUTLINING: u8 = 0xC2;
pub const XA_HIGHLIGHTING: u8 = 0x41;
pub const XA_FOREGROUND: u8 = 0x42;
pub const XA_CHARSET: u8 = 0x43;
pub const XA_BACKGROUND: u8 = 0x45;
pub const XA_TRANSPARENCY: u8 = 0x46;

/// Structured field ids recognized by the parser
pub const SF_SNA_RESPONSE: u8 = 0x01;
pub const SF_BIND_IMAGE: u8 = 0x03;
pub const SF_UNBIND: u8 = 0x0F;
pub const SF_ERASE_RESET: u8 = 0x40;
pub const SF_QUERY_REPLY: u8 = 0x81;
pub const SF_PRINTER_STATUS: u8 = 0x85;

/// BIND-IMAGE subfield ids
pub const BIND_SUBFIELD_PSC: u8 = 0x01;
pub const BIND_SUBFIELD_QUERY_REPLY_IDS: u8 = 0x02;

/// Query reply types carried inside SF_QUERY_REPLY
pub const QUERY_REPLY_DEVICE_TYPE: u8 = 0x84;
pub const QUERY_REPLY_CHARACTERISTICS: u8 = 0x85;
pub const QUERY_REPLY_USABLE_AREA: u8 = 0x81;
pub const QUERY_REPLY_COLOR: u8 = 0x86;
pub const QUERY_REPLY_HIGHLIGHTING: u8 = 0x87;

/// SNA response layout constants (§ SNA-RESPONSE payloads)
pub const SNA_COMMAND_RESPONSE: u8 = 0x01;
pub const SNA_DATA_RESPONSE: u8 = 0x02;
pub const SNA_FLAGS_NONE: u8 = 0x00;
pub const SNA_FLAGS_RSP: u8 = 0x08;
pub const SNA_FLAGS_EXCEPTION_RESPONSE: u8 = 0x80;
pub const SNA_SENSE_CODE_SUCCESS: u16 = 0x0000;
pub const SNA_SENSE_CODE_INVALID_FORMAT: u16 = 0x1001;
pub const SNA_SENSE_CODE_NOT_SUPPORTED: u16 = 0x1002;
pub const SNA_SENSE_CODE_SESSION_FAILURE: u16 = 0x8001;

/// SCS control codes honored for printer sessions
pub const SCS_BS: u8 = 0x08;
pub const SCS_HT: u8 = 0x09;
pub const SCS_LF: u8 = 0x0A;
pub const SCS_VT: u8 = 0x0B;
pub const SCS_FF: u8 = 0x0C;
pub const SCS_CR: u8 = 0x0D;
pub const SCS_SO: u8 = 0x0E;
pub const SCS_SI: u8 = 0x0F;
pub const SCS_NL: u8 = 0x15;
pub const SCS_ENQ: u8 = 0x05;
pub const SCS_ACK: u8 = 0x06;
pub const SCS_BEL: u8 = 0x07;

/// Printer status bytes carried after SOH
pub const SOH_SUCCESS: u8 = 0x00;
pub const SOH_DEVICE_END: u8 = 0x40;
pub const SOH_INTERVENTION_REQUIRED: u8 = 0x60;

/// Enum representation of 3270 command codes for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandCode {
    Write,
    EraseWrite,
    EraseWriteAlternate,
    ReadBuffer,
    ReadModified,
    ReadModifiedAll,
    EraseAllUnprotected,
    WriteStructuredField,
}

impl CommandCode {
    /// Convert a byte value to a CommandCode enum
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            CMD_WRITE => Some(Self::Write),
            CMD_ERASE_WRITE => Some(Self::EraseWrite),
            CMD_ERASE_WRITE_ALTERNATE => Some(Self::EraseWriteAlternate),
            CMD_READ_BUFFER => Some(Self::ReadBuffer),
            CMD_READ_MODIFIED => Some(Self::ReadModified),
            CMD_READ_MODIFIED_ALL => Some(Self::ReadModifiedAll),
            CMD_ERASE_ALL_UNPROTECTED => Some(Self::EraseAllUnprotected),
            CMD_WRITE_STRUCTURED_FIELD => Some(Self::WriteStructuredField),
            _ => None,
        }
    }

    /// Convert CommandCode enum to byte value
    pub fn to_u8(self) -> u8 {
        match self {
            Self::Write => CMD_WRITE,
            Self::EraseWrite => CMD_ERASE_WRITE,
            Self::EraseWriteAlternate => CMD_ERASE_WRITE_ALTERNATE,
            Self::ReadBuffer => CMD_READ_BUFFER,
            Self::ReadModified => CMD_READ_MODIFIED,
            Self::ReadModifiedAll => CMD_READ_MODIFIED_ALL,
            Self::EraseAllUnprotected => CMD_ERASE_ALL_UNPROTECTED,
            Self::WriteStructuredField => CMD_WRITE_STRUCTURED_FIELD,
        }
    }
}

/// Enum representation of 3270 order codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderCode {
    StartField,
    StartFieldExtended,
    SetBufferAddress,
    SetAttribute,
    ModifyField,
    InsertCursor,
    ProgramTab,
    RepeatToAddress,
    EraseUnprotectedToAddress,
    GraphicEscape,
}

impl OrderCode {
    /// Convert a byte value to an OrderCode enum
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            ORDER_SF => Some(Self::StartField),
            ORDER_SFE => Some(Self::StartFieldExtended),
            ORDER_SBA => Some(Self::SetBufferAddress),
            ORDER_SA => Some(Self::SetAttribute),
            ORDER_MF => Some(Self::ModifyField),
            ORDER_IC => Some(Self::InsertCursor),
            ORDER_PT => Some(Self::ProgramTab),
            ORDER_RA => Some(Self::RepeatToAddress),
            ORDER_EUA => Some(Self::EraseUnprotectedToAddress),
            ORDER_GE => Some(Self::GraphicEscape),
            _ => None,
        }
    }

    /// Convert OrderCode enum to byte value
    pub fn to_u8(self) -> u8 {
        match self {
            Self::StartField => ORDER_SF,
            Self::StartFieldExtended => ORDER_SFE,
            Self::SetBufferAddress => ORDER_SBA,
            Self::SetAttribute => ORDER_SA,
            Self::ModifyField => ORDER_MF,
            Self::InsertCursor => ORDER_IC,
            Self::ProgramTab => ORDER_PT,
            Self::RepeatToAddress => ORDER_RA,
            Self::EraseUnprotectedToAddress => ORDER_EUA,
            Self::GraphicEscape => ORDER_GE,
        }
    }
}

/// Enum representation of AID keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AidKey {
    NoAid,
    Enter,
    Clear,
    PA1,
    PA2,
    PA3,
    PF1, PF2, PF3, PF4, PF5, PF6,
    PF7, PF8, PF9, PF10, PF11, PF12,
    PF13, PF14, PF15, PF16, PF17, PF18,
    PF19, PF20, PF21, PF22, PF23, PF24,
    StructuredField,
    ReadPartition,
    SysReq,
}

impl AidKey {
    /// AID key for a PF key number (1..=24)
    pub fn pf(n: u8) -> Option<Self> {
        match n {
            1 => Some(Self::PF1),
            2 => Some(Self::PF2),
            3 => Some(Self::PF3),
            4 => Some(Self::PF4),
            5 => Some(Self::PF5),
            6 => Some(Self::PF6),
            7 => Some(Self::PF7),
            8 => Some(Self::PF8),
            9 => Some(Self::PF9),
            10 => Some(Self::PF10),
            11 => Some(Self::PF11),
            12 => Some(Self::PF12),
            13 => Some(Self::PF13),
            14 => Some(Self::PF14),
            15 => Some(Self::PF15),
            16 => Some(Self::PF16),
            17 => Some(Self::PF17),
            18 => Some(Self::PF18),
            19 => Some(Self::PF19),
            20 => Some(Self::PF20),
            21 => Some(Self::PF21),
            22 => Some(Self::PF22),
            23 => Some(Self::PF23),
            24 => Some(Self::PF24),
            _ => None,
        }
    }

    /// AID key for a PA key number (1..=3)
    pub fn pa(n: u8) -> Option<Self> {
        match n {
            1 => Some(Self::PA1),
            2 => Some(Self::PA2),
            3 => Some(Self::PA3),
            _ => None,
        }
    }

    /// Look up an AID key by its s3270-style name ("Enter", "PF3", "PA1", ...)
    pub fn from_name(name: &str) -> Option<Self> {
        let upper = name.to_ascii_uppercase();
        match upper.as_str() {
            "ENTER" => Some(Self::Enter),
            "CLEAR" => Some(Self::Clear),
            "SYSREQ" => Some(Self::SysReq),
            _ => {
                if let Some(rest) = upper.strip_prefix("PF") {
                    rest.parse::<u8>().ok().and_then(Self::pf)
                } else if let Some(rest) = upper.strip_prefix("PA") {
                    rest.parse::<u8>().ok().and_then(Self::pa)
                } else {
                    None
                }
            }
        }
    }

    /// Convert a byte value to an AidKey enum
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            AID_NO_AID => Some(Self::NoAid),
            AID_ENTER => Some(Self::Enter),
            AID_CLEAR => Some(Self::Clear),
            AID_PA1 => Some(Self::PA1),
            AID_PA2 => Some(Self::PA2),
            AID_PA3 => Some(Self::PA3),
            AID_PF1 => Some(Self::PF1),
            AID_PF2 => Some(Self::PF2),
            AID_PF3 => Some(Self::PF3),
            AID_PF4 => Some(Self::PF4),
            AID_PF5 => Some(Self::PF5),
            AID_PF6 => Some(Self::PF6),
            AID_PF7 => Some(Self::PF7),
            AID_PF8 => Some(Self::PF8),
            AID_PF9 => Some(Self::PF9),
            AID_PF10 => Some(Self::PF10),
            AID_PF11 => Some(Self::PF11),
            AID_PF12 => Some(Self::PF12),
            AID_PF13 => Some(Self::PF13),
            AID_PF14 => Some(Self::PF14),
            AID_PF15 => Some(Self::PF15),
            AID_PF16 => Some(Self::PF16),
            AID_PF17 => Some(Self::PF17),
            AID_PF18 => Some(Self::PF18),
            AID_PF19 => Some(Self::PF19),
            AID_PF20 => Some(Self::PF20),
            AID_PF21 => Some(Self::PF21),
            AID_PF22 => Some(Self::PF22),
            AID_PF23 => Some(Self::PF23),
            AID_PF24 => Some(Self::PF24),
            AID_STRUCTURED_FIELD => Some(Self::StructuredField),
            AID_READ_PARTITION => Some(Self::ReadPartition),
            AID_SYSREQ => Some(Self::SysReq),
            _ => None,
        }
    }

    /// Convert AidKey enum to byte value
    pub fn to_u8(self) -> u8 {
        match self {
            Self::NoAid => AID_NO_AID,
            Self::Enter => AID_ENTER,
            Self::Clear => AID_CLEAR,
            Self::PA1 => AID_PA1,
            Self::PA2 => AID_PA2,
            Self::PA3 => AID_PA3,
            Self::PF1 => AID_PF1,
            Self::PF2 => AID_PF2,
            Self::PF3 => AID_PF3,
            Self::PF4 => AID_PF4,
            Self::PF5 => AID_PF5,
            Self::PF6 => AID_PF6,
            Self::PF7 => AID_PF7,
            Self::PF8 => AID_PF8,
            Self::PF9 => AID_PF9,
            Self::PF10 => AID_PF10,
            Self::PF11 => AID_PF11,
            Self::PF12 => AID_PF12,
            Self::PF13 => AID_PF13,
            Self::PF14 => AID_PF14,
            Self::PF15 => AID_PF15,
            Self::PF16 => AID_PF16,
            Self::PF17 => AID_PF17,
            Self::PF18 => AID_PF18,
            Self::PF19 => AID_PF19,
            Self::PF20 => AID_PF20,
            Self::PF21 => AID_PF21,
            Self::PF22 => AID_PF22,
            Self::PF23 => AID_PF23,
            Self::PF24 => AID_PF24,
            Self::StructuredField => AID_STRUCTURED_FIELD,
            Self::ReadPartition => AID_READ_PARTITION,
            Self::SysReq => AID_SYSREQ,
        }
    }
}

/// TN3270E record header data types (RFC 2355 §3, plus the two private
/// extension slots used for printer status and SNA responses).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Tn3270Data,
    ScsData,
    Response,
    BindImage,
    Unbind,
    NvtData,
    Request,
    SscpLuData,
    PrintEoj,
    SnaResponse,
    PrinterStatus,
}

impl DataType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Tn3270Data),
            0x01 => Some(Self::ScsData),
            0x02 => Some(Self::Response),
            0x03 => Some(Self::BindImage),
            0x04 => Some(Self::Unbind),
            0x05 => Some(Self::NvtData),
            0x06 => Some(Self::Request),
            0x07 => Some(Self::SscpLuData),
            0x08 => Some(Self::PrintEoj),
            0x09 => Some(Self::SnaResponse),
            0x0A => Some(Self::PrinterStatus),
            _ => None,
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Self::Tn3270Data => 0x00,
            Self::ScsData => 0x01,
            Self::Response => 0x02,
            Self::BindImage => 0x03,
            Self::Unbind => 0x04,
            Self::NvtData => 0x05,
            Self::Request => 0x06,
            Self::SscpLuData => 0x07,
            Self::PrintEoj => 0x08,
            Self::SnaResponse => 0x09,
            Self::PrinterStatus => 0x0A,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_code_conversion() {
        assert_eq!(CommandCode::from_u8(CMD_WRITE), Some(CommandCode::Write));
        assert_eq!(CommandCode::Write.to_u8(), CMD_WRITE);
        assert_eq!(CommandCode::from_u8(0x00), None);
    }

    #[test]
    fn test_order_code_conversion() {
        assert_eq!(OrderCode::from_u8(ORDER_SF), Some(OrderCode::StartField));
        assert_eq!(OrderCode::StartField.to_u8(), ORDER_SF);
        assert_eq!(OrderCode::from_u8(0xFF), None);
    }

    #[test]
    fn test_aid_key_conversion() {
        assert_eq!(AidKey::from_u8(AID_ENTER), Some(AidKey::Enter));
        assert_eq!(AidKey::Enter.to_u8(), AID_ENTER);
        assert_eq!(AidKey::from_u8(AID_PF1), Some(AidKey::PF1));
        assert_eq!(AidKey::PF1.to_u8(), AID_PF1);
    }

    #[test]
    fn test_aid_key_names() {
        assert_eq!(AidKey::from_name("Enter"), Some(AidKey::Enter));
        assert_eq!(AidKey::from_name("pf12"), Some(AidKey::PF12));
        assert_eq!(AidKey::from_name("PA3"), Some(AidKey::PA3));
        assert_eq!(AidKey::from_name("PF25"), None);
        assert_eq!(AidKey::from_name("bogus"), None);
    }

    #[test]
    fn test_pa_aid_values() {
        assert_eq!(AidKey::PA1.to_u8(), 0x6C);
        assert_eq!(AidKey::PA2.to_u8(), 0x6B);
        assert_eq!(AidKey::PA3.to_u8(), 0x6A);
    }

    #[test]
    fn test_data_type_round_trip() {
        for value in 0x00..=0x0A {
            let dt = DataType::from_u8(value).expect("known data type");
            assert_eq!(dt.to_u8(), value);
        }
        assert_eq!(DataType::from_u8(0x0B), None);
    }

    #[test]
    fn test_field_attribute_bits() {
        let protected_numeric = ATTR_PROTECTED | ATTR_NUMERIC;
        assert_eq!(protected_numeric & ATTR_PROTECTED, ATTR_PROTECTED);
        assert_eq!(protected_numeric & ATTR_NUMERIC, ATTR_NUMERIC);
    }
}
