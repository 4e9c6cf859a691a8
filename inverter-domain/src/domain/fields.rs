use std::ops::Index;

/// Identifier column of an inverter export (one device per export).
pub const SERIAL_NUMBER: &str = "Serial number";
/// Sample timestamp column.
pub const TIME: &str = "Time";
/// State of charge, exported as a percentage string such as `"42%"`.
pub const SOC: &str = "soc";

/// Columns every inverter export must carry, in report order.
pub const REQUIRED_FIELDS: [&str; 24] = [
    SERIAL_NUMBER,
    TIME,
    "vpv1",
    "vpv2",
    "vpv3",
    "vBat",
    SOC,
    "ppv1",
    "ppv2",
    "ppv3",
    "pCharge",
    "pDisCharge",
    "pinv",
    "prec",
    "pf",
    "vepsr",
    "vepss",
    "vepst",
    "feps",
    "peps",
    "seps",
    "pToGrid",
    "pToUser",
    "pLoad",
];

/// Numeric columns of the required field set.
///
/// Declaration order follows [`REQUIRED_FIELDS`]; the discriminant doubles as
/// the slot in [`ChannelValues`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    Vpv1,
    Vpv2,
    Vpv3,
    VBat,
    Soc,
    Ppv1,
    Ppv2,
    Ppv3,
    PCharge,
    PDisCharge,
    Pinv,
    Prec,
    Pf,
    Vepsr,
    Vepss,
    Vepst,
    Feps,
    Peps,
    Seps,
    PToGrid,
    PToUser,
    PLoad,
}

impl Channel {
    pub const COUNT: usize = 22;

    pub const ALL: [Channel; Channel::COUNT] = [
        Channel::Vpv1,
        Channel::Vpv2,
        Channel::Vpv3,
        Channel::VBat,
        Channel::Soc,
        Channel::Ppv1,
        Channel::Ppv2,
        Channel::Ppv3,
        Channel::PCharge,
        Channel::PDisCharge,
        Channel::Pinv,
        Channel::Prec,
        Channel::Pf,
        Channel::Vepsr,
        Channel::Vepss,
        Channel::Vepst,
        Channel::Feps,
        Channel::Peps,
        Channel::Seps,
        Channel::PToGrid,
        Channel::PToUser,
        Channel::PLoad,
    ];

    /// Column name as it appears in the export header.
    pub const fn field_name(self) -> &'static str {
        match self {
            Channel::Vpv1 => "vpv1",
            Channel::Vpv2 => "vpv2",
            Channel::Vpv3 => "vpv3",
            Channel::VBat => "vBat",
            Channel::Soc => SOC,
            Channel::Ppv1 => "ppv1",
            Channel::Ppv2 => "ppv2",
            Channel::Ppv3 => "ppv3",
            Channel::PCharge => "pCharge",
            Channel::PDisCharge => "pDisCharge",
            Channel::Pinv => "pinv",
            Channel::Prec => "prec",
            Channel::Pf => "pf",
            Channel::Vepsr => "vepsr",
            Channel::Vepss => "vepss",
            Channel::Vepst => "vepst",
            Channel::Feps => "feps",
            Channel::Peps => "peps",
            Channel::Seps => "seps",
            Channel::PToGrid => "pToGrid",
            Channel::PToUser => "pToUser",
            Channel::PLoad => "pLoad",
        }
    }

    pub fn from_field_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL.into_iter().find(|c| c.field_name() == name)
    }

    pub const fn index(self) -> usize {
        self as usize
    }
}

/// One optional reading per [`Channel`]. `None` means the sample was missing.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChannelValues([Option<f64>; Channel::COUNT]);

impl ChannelValues {
    pub fn get(&self, channel: Channel) -> Option<f64> {
        self.0[channel.index()]
    }

    pub fn set(&mut self, channel: Channel, value: Option<f64>) {
        self.0[channel.index()] = value;
    }

    pub fn iter(&self) -> impl Iterator<Item = (Channel, Option<f64>)> + '_ {
        Channel::ALL.into_iter().map(move |c| (c, self.get(c)))
    }
}

impl Index<Channel> for ChannelValues {
    type Output = Option<f64>;

    fn index(&self, channel: Channel) -> &Self::Output {
        &self.0[channel.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channels_follow_required_field_order() {
        let numeric: Vec<&str> = REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|f| *f != SERIAL_NUMBER && *f != TIME)
            .collect();
        let channels: Vec<&str> = Channel::ALL.iter().map(|c| c.field_name()).collect();
        assert_eq!(numeric, channels);
    }

    #[test]
    fn channel_lookup_ignores_surrounding_whitespace() {
        assert_eq!(Channel::from_field_name(" pDisCharge "), Some(Channel::PDisCharge));
        assert_eq!(Channel::from_field_name("Time"), None);
    }

    #[test]
    fn channel_values_index_by_channel() {
        let mut values = ChannelValues::default();
        values.set(Channel::PLoad, Some(12.5));
        assert_eq!(values[Channel::PLoad], Some(12.5));
        assert_eq!(values.get(Channel::Ppv1), None);
        assert_eq!(values.iter().filter(|(_, v)| v.is_some()).count(), 1);
    }
}
