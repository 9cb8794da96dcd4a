use alloy_sol_types::sol;

sol! {
    interface IGmPortal {
        #[derive(Debug, PartialEq, Eq)]
        struct Gm {
            address gmer;
            string message;
            uint256 timestamp;
        }

        #[derive(Debug, PartialEq, Eq)]
        event NewGm(address indexed from, uint256 timestamp, string message);

        function gm(string memory message) external;
        function getAllGms() external view returns (Gm[] memory);
    }
}
