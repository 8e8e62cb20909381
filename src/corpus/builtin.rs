//! Built-in corpus for a long-running fortune-telling companion agent.

use super::{Scenario, ScenarioCorpus, TestCase};
use crate::error::EvalResult;

/// Name of the built-in corpus.
pub const BUILTIN_CORPUS_NAME: &str = "companion-memory-v1";

/// Scenario: preferences that change over time.
pub const SCENARIO_PREFERENCE_TIMELINE: &str = "时间序列偏好变化（测试时间关联 + 偏好追踪能力）";
/// Scenario: personal facts scattered across many conversations.
pub const SCENARIO_FRAGMENTED_PROFILE: &str = "个人信息碎片化（测试零散信息整合）";
/// Scenario: people around the user and how they relate.
pub const SCENARIO_RELATIONSHIPS: &str = "复杂关系网络（测试人际关联记忆）";
/// Scenario: divination core facts (birth data, past readings).
pub const SCENARIO_DIVINATION: &str = "算命场景专门测试（测试算命核心信息记忆）";
/// Scenario: how the user chats.
pub const SCENARIO_CHAT_HABITS: &str = "聊天习惯分析（测试用户行为模式记忆）";
/// Scenario: situation to behavior associations.
pub const SCENARIO_SITUATIONAL: &str = "情境化行为模式（测试场景-行为关联记忆）";
/// Scenario: long-term life events on a timeline.
pub const SCENARIO_LIFE_TRAJECTORY: &str = "长期人生轨迹（测试时间轴-事件关联记忆）";

/// Build the built-in corpus.
pub fn builtin_corpus() -> EvalResult<ScenarioCorpus> {
    let scenarios = vec![
        Scenario::new(
            SCENARIO_PREFERENCE_TIMELINE,
            vec![
                TestCase::new(
                    "我最近喜欢喝什么饮料？",
                    "用户以前喜欢喝咖啡，从今年三月开始改喝绿茶，现在最喜欢的是茉莉花茶。",
                ),
                TestCase::new(
                    "我的运动习惯有什么变化？",
                    "用户去年主要跑步，今年夏天开始改为游泳，每周三次。",
                ),
                TestCase::new(
                    "我现在更喜欢看什么类型的书？",
                    "用户早期偏爱推理小说，近半年转向历史和传统文化书籍，尤其是《周易》相关读物。",
                ),
            ],
        ),
        Scenario::new(
            SCENARIO_FRAGMENTED_PROFILE,
            vec![
                TestCase::new(
                    "总结一下你了解的我的基本信息",
                    "用户名叫林晓，1992年农历八月十五出生，在杭州做产品经理，养了一只叫豆豆的猫。",
                ),
                TestCase::new(
                    "我是做什么工作的？",
                    "用户在杭州一家互联网公司担任产品经理，负责教育类产品。",
                ),
                TestCase::new("我的宠物叫什么？", "用户养了一只名叫豆豆的橘猫，已经三岁。"),
            ],
        ),
        Scenario::new(
            SCENARIO_RELATIONSHIPS,
            vec![
                TestCase::new(
                    "我和我妹妹的关系怎么样？",
                    "用户的妹妹林月在上海读研究生，两人关系亲密，每周视频通话。",
                ),
                TestCase::new(
                    "我的同事老张是谁？",
                    "老张是用户的直属领导，比用户大十岁，曾在项目上多次帮助用户。",
                ),
                TestCase::new(
                    "我男朋友和我父母相处得怎么样？",
                    "用户的男朋友陈磊去年春节第一次见了用户父母，父亲比较满意，母亲担心他工作太忙。",
                ),
            ],
        ),
        Scenario::new(
            SCENARIO_DIVINATION,
            vec![
                TestCase::new(
                    "我的出生信息是什么？",
                    "用户出生于1992年农历八月十五酉时，属猴，上次测算显示五行缺水。",
                ),
                TestCase::new(
                    "我之前问过哪些方面的运势？",
                    "用户主要询问过事业运和感情运，关心今年是否适合跳槽以及和男朋友的婚期。",
                ),
                TestCase::new(
                    "上次塔罗占卜的结果是什么？",
                    "上次用户抽到星星牌正位，解读为事业上会迎来新的希望，建议保持耐心。",
                ),
            ],
        ),
        Scenario::new(
            SCENARIO_CHAT_HABITS,
            vec![
                TestCase::new(
                    "我一般什么时候来聊天？",
                    "用户通常在晚上十点以后聊天，周末偶尔在下午出现。",
                ),
                TestCase::new(
                    "我喜欢什么样的回答风格？",
                    "用户喜欢简洁直接的回答，不喜欢太长的解释，但对命理细节会追问。",
                ),
                TestCase::new(
                    "我聊天时有什么口头禅？",
                    "用户常用“真的假的”表达惊讶，聊天时喜欢发猫咪表情。",
                ),
            ],
        ),
        Scenario::new(
            SCENARIO_SITUATIONAL,
            vec![
                TestCase::new(
                    "我压力大的时候通常会做什么？",
                    "用户压力大时会去西湖边散步，或者来找助手看看当天的运势。",
                ),
                TestCase::new(
                    "我面对重要决定时有什么习惯？",
                    "用户做重要决定前习惯先抽一张塔罗牌，再和妹妹商量。",
                ),
                TestCase::new(
                    "我出差时有什么特别的习惯？",
                    "用户出差时总会戴上朋友送的紫水晶手链，认为能带来好运。",
                ),
            ],
        ),
        Scenario::new(
            SCENARIO_LIFE_TRAJECTORY,
            vec![
                TestCase::new(
                    "我大学毕业后的经历是怎样的？",
                    "用户2014年大学毕业后在北京做了三年运营，2017年搬到杭州转做产品经理，2022年升为高级产品经理。",
                ),
                TestCase::new(
                    "我人生中最重要的转折点是什么？",
                    "用户认为2017年离开北京搬到杭州是最重要的转折点，之后事业和感情都有了起色。",
                ),
                TestCase::new(
                    "我未来几年有什么规划？",
                    "用户计划两年内和男朋友结婚，并考虑在三十五岁前创业做教育产品。",
                ),
            ],
        ),
    ];

    ScenarioCorpus::new(BUILTIN_CORPUS_NAME, scenarios)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_corpus_is_valid() {
        let corpus = builtin_corpus().unwrap();
        assert_eq!(corpus.name(), BUILTIN_CORPUS_NAME);
        assert_eq!(corpus.scenarios().len(), 7);
        assert_eq!(corpus.case_count(), 21);
        assert!(corpus.get(SCENARIO_DIVINATION).is_some());
    }
}
