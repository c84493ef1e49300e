use serde::Serialize;

/// Time spent in one validator during one iteration, in seconds
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleStatistics {
    pub validator: String,
    pub rule_execution_time: f64,
}

/// Timings for one batch file, in seconds
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IterationStatistics {
    pub gtfs_read_time: f64,
    pub to_byte_array_time: f64,
    pub decode_protobuf_time: f64,
    pub total_iteration_time: f64,
    pub rule_statistics: Vec<RuleStatistics>,
}

impl IterationStatistics {
    pub fn add_rule(&mut self, validator: &str, seconds: f64) {
        self.rule_statistics.push(RuleStatistics { validator: validator.to_string(), rule_execution_time: seconds });
    }

    pub fn total_rule_time(&self) -> f64 {
        self.rule_statistics.iter().map(|r| r.rule_execution_time).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_camel_case() -> anyhow::Result<()> {
        let mut stats = IterationStatistics { decode_protobuf_time: 0.5, ..Default::default() };
        stats.add_rule("HeaderValidator", 0.25);
        stats.add_rule("StopValidator", 0.25);
        assert_eq!(stats.total_rule_time(), 0.5);

        let json = serde_json::to_value(&stats)?;
        assert_eq!(json["decodeProtobufTime"], 0.5);
        assert_eq!(json["ruleStatistics"][0]["validator"], "HeaderValidator");
        assert_eq!(json["ruleStatistics"][1]["ruleExecutionTime"], 0.25);
        Ok(())
    }
}
